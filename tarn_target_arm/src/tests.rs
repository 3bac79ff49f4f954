//! Tests for A32 encoding and ELF emission.

use object::{Object, ObjectSection, ObjectSymbol, RelocationTarget};

use tarn_target::backend::{Backend, EmitError};
use tarn_target::reloc::{RelocKind, Relocation};
use tarn_target::types::{StaticData, SymbolAlias};

use crate::backend::ArmBackend;
use crate::encode::{LR, bx, mov_imm, return_stub, words_to_bytes};

#[test]
fn encode_bx_lr() {
    assert_eq!(bx(LR), 0xe12f_ff1e);
    assert_eq!(words_to_bytes(&[bx(LR)]), vec![0x1e, 0xff, 0x2f, 0xe1]);
}

#[test]
fn encode_mov_imm() {
    // mov r0, #42
    assert_eq!(mov_imm(0, 42), 0xe3a0_002a);
}

fn sample_statics() -> Vec<StaticData> {
    vec![
        StaticData {
            name: "VTable_0".to_string(),
            data: vec![0; 8],
            relocations: vec![],
            writable: true,
        },
        StaticData {
            name: "String_3".to_string(),
            data: vec![0x41, 0, 0x42, 0],
            relocations: vec![],
            writable: false,
        },
        StaticData {
            name: "Obj_1".to_string(),
            data: vec![6, 0, 0, 0, 0, 0, 0, 0],
            relocations: vec![Relocation {
                offset: 4,
                symbol: "VTable_0".to_string(),
                kind: RelocKind::Abs32,
            }],
            writable: false,
        },
    ]
}

#[test]
fn emit_places_data_by_mutability() {
    let functions = vec![return_stub("Boot_0")];
    let aliases = vec![SymbolAlias {
        name: "main".to_string(),
        target: "Boot_0".to_string(),
    }];
    let bytes = ArmBackend
        .emit_object(&functions, &sample_statics(), &aliases)
        .unwrap();

    let file = object::File::parse(&*bytes).unwrap();
    assert_eq!(file.architecture(), object::Architecture::Arm);
    assert!(file.is_little_endian());

    let section_of = |name: &str| {
        let sym = file.symbols().find(|s| s.name() == Ok(name)).unwrap();
        let index = sym.section_index().unwrap();
        file.section_by_index(index).unwrap().name().unwrap().to_string()
    };
    assert_eq!(section_of("VTable_0"), ".data");
    assert_eq!(section_of("String_3"), ".rodata");
    assert_eq!(section_of("Obj_1"), ".data.rel.ro");
    assert_eq!(section_of("Boot_0"), ".text");

    let boot = file.symbols().find(|s| s.name() == Ok("Boot_0")).unwrap();
    let main = file.symbols().find(|s| s.name() == Ok("main")).unwrap();
    assert_eq!(boot.address(), main.address());
    assert_eq!(main.size(), 4);
}

#[test]
fn emit_relocates_pointer_slots() {
    let bytes = ArmBackend.emit_object(&[], &sample_statics(), &[]).unwrap();
    let file = object::File::parse(&*bytes).unwrap();

    let section = file.section_by_name(".data.rel.ro").unwrap();
    let relocs: Vec<_> = section.relocations().collect();
    assert_eq!(relocs.len(), 1);
    let (offset, reloc) = &relocs[0];
    assert_eq!(*offset, 4);
    assert_eq!(reloc.size(), 32);
    let RelocationTarget::Symbol(index) = reloc.target() else {
        panic!("expected symbol target");
    };
    assert_eq!(file.symbol_by_index(index).unwrap().name(), Ok("VTable_0"));
}

#[test]
fn emit_leaves_unknown_targets_undefined() {
    let statics = vec![StaticData {
        name: "Delegate_2".to_string(),
        data: vec![0; 4],
        relocations: vec![Relocation {
            offset: 0,
            symbol: "Program::Run_5".to_string(),
            kind: RelocKind::Abs32,
        }],
        writable: true,
    }];
    let bytes = ArmBackend.emit_object(&[], &statics, &[]).unwrap();
    let file = object::File::parse(&*bytes).unwrap();
    let target = file
        .symbols()
        .find(|s| s.name() == Ok("Program::Run_5"))
        .unwrap();
    assert!(target.is_undefined());
}

#[test]
fn emit_rejects_alias_without_body() {
    let aliases = vec![SymbolAlias {
        name: "main".to_string(),
        target: "Missing_9".to_string(),
    }];
    let err = ArmBackend.emit_object(&[], &[], &aliases).unwrap_err();
    assert!(matches!(err, EmitError::UndefinedAliasTarget { ref target, .. } if target == "Missing_9"));
}

#[test]
fn emit_rejects_wide_relocations() {
    let statics = vec![StaticData {
        name: "Wide_0".to_string(),
        data: vec![0; 8],
        relocations: vec![Relocation {
            offset: 0,
            symbol: "Other".to_string(),
            kind: RelocKind::Abs64,
        }],
        writable: true,
    }];
    let err = ArmBackend.emit_object(&[], &statics, &[]).unwrap_err();
    assert!(matches!(err, EmitError::UnsupportedRelocation { .. }));
}
