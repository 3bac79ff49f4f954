//! ELF object file emission using the `object` crate.

use object::write::{
    Object, Relocation as ObjRelocation, SectionId, Symbol, SymbolId, SymbolSection,
};
use object::{
    Architecture, BinaryFormat, Endianness, RelocationEncoding, RelocationFlags, RelocationKind,
    SymbolFlags, SymbolKind, SymbolScope,
};
use rustc_hash::FxHashMap;

use tarn_target::backend::EmitError;
use tarn_target::reloc::{RelocKind, Relocation};
pub use tarn_target::types::{CompiledFunction, StaticData, SymbolAlias};

/// Alignment of every data blob: one machine word.
const DATA_ALIGN: u64 = 4;
/// Alignment of function bodies.
const CODE_ALIGN: u64 = 4;

/// `.L`-prefixed symbols are file-local data blobs; use STB_LOCAL so they
/// don't collide with identically-named symbols in other object files.
fn scope_for(name: &str) -> SymbolScope {
    if name.starts_with(".L") {
        SymbolScope::Compilation
    } else {
        SymbolScope::Linkage
    }
}

fn reloc_flags(reloc: &Relocation) -> Result<RelocationFlags, EmitError> {
    match reloc.kind {
        RelocKind::Abs32 => Ok(RelocationFlags::Generic {
            kind: RelocationKind::Absolute,
            encoding: RelocationEncoding::Generic,
            size: 32,
        }),
        RelocKind::Abs64 => Err(EmitError::UnsupportedRelocation {
            symbol: reloc.symbol.clone(),
            kind: reloc.kind,
        }),
    }
}

/// Add one relocation; targets not defined in this object become undefined
/// symbols.
fn add_reloc(
    obj: &mut Object<'_>,
    sym_map: &mut FxHashMap<String, SymbolId>,
    section: SectionId,
    base: u64,
    reloc: &Relocation,
) -> Result<(), EmitError> {
    let symbol = match sym_map.get(&reloc.symbol) {
        Some(&existing) => existing,
        None => {
            let s = obj.add_symbol(Symbol {
                name: reloc.symbol.as_bytes().to_vec(),
                value: 0,
                size: 0,
                kind: SymbolKind::Unknown,
                scope: SymbolScope::Unknown,
                weak: false,
                section: SymbolSection::Undefined,
                flags: SymbolFlags::None,
            });
            sym_map.insert(reloc.symbol.clone(), s);
            s
        }
    };
    obj.add_relocation(
        section,
        ObjRelocation {
            offset: base + reloc.offset as u64,
            symbol,
            addend: 0,
            flags: reloc_flags(reloc)?,
        },
    )
    .map_err(|e| EmitError::Object(e.to_string()))
}

/// Emit functions, static data, and aliases as a 32-bit ARM ELF object.
///
/// Data placement: writable blobs go to `.data`, read-only blobs without
/// relocations to `.rodata`, read-only blobs with relocations to
/// `.data.rel.ro`. Relocation targets not defined in this object become
/// undefined symbols for the linker.
pub fn emit_elf_with_data(
    functions: &[CompiledFunction],
    statics: &[StaticData],
    aliases: &[SymbolAlias],
) -> Result<Vec<u8>, EmitError> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Arm, Endianness::Little);

    // Track symbol name → SymbolId so relocations can reference symbols
    // defined anywhere in this object, regardless of emission order.
    let mut sym_map: FxHashMap<String, SymbolId> = FxHashMap::default();
    let mut placed_data = Vec::with_capacity(statics.len());
    let mut function_offsets: FxHashMap<&str, (u64, u64)> = FxHashMap::default();

    // First pass: define every symbol.
    let text = obj.section_id(object::write::StandardSection::Text);
    let mut placed_code = Vec::with_capacity(functions.len());
    for func in functions {
        let offset = obj.append_section_data(text, &func.code, CODE_ALIGN);
        let sid = obj.add_symbol(Symbol {
            name: func.name.as_bytes().to_vec(),
            value: offset,
            size: func.code.len() as u64,
            kind: SymbolKind::Text,
            scope: scope_for(&func.name),
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
        sym_map.insert(func.name.clone(), sid);
        function_offsets.insert(func.name.as_str(), (offset, func.code.len() as u64));
        placed_code.push(offset);
    }

    for sd in statics {
        let standard = if sd.writable {
            object::write::StandardSection::Data
        } else if sd.relocations.is_empty() {
            object::write::StandardSection::ReadOnlyData
        } else {
            object::write::StandardSection::ReadOnlyDataWithRel
        };
        let section = obj.section_id(standard);
        let offset = obj.append_section_data(section, &sd.data, DATA_ALIGN);
        let sid = obj.add_symbol(Symbol {
            name: sd.name.as_bytes().to_vec(),
            value: offset,
            size: sd.data.len() as u64,
            kind: SymbolKind::Data,
            scope: scope_for(&sd.name),
            weak: false,
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        });
        sym_map.insert(sd.name.clone(), sid);
        placed_data.push((section, offset));
    }

    for alias in aliases {
        let Some(&(offset, size)) = function_offsets.get(alias.target.as_str()) else {
            return Err(EmitError::UndefinedAliasTarget {
                alias: alias.name.clone(),
                target: alias.target.clone(),
            });
        };
        let sid = obj.add_symbol(Symbol {
            name: alias.name.as_bytes().to_vec(),
            value: offset,
            size,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
        sym_map.insert(alias.name.clone(), sid);
    }

    // Second pass: relocations.
    for (func, &offset) in functions.iter().zip(&placed_code) {
        for reloc in &func.relocations {
            add_reloc(&mut obj, &mut sym_map, text, offset, reloc)?;
        }
    }
    for (sd, &(section, offset)) in statics.iter().zip(&placed_data) {
        for reloc in &sd.relocations {
            add_reloc(&mut obj, &mut sym_map, section, offset, reloc)?;
        }
    }

    let mut buf = Vec::new();
    obj.emit(&mut buf)
        .map_err(|e| EmitError::Object(e.to_string()))?;
    Ok(buf)
}
