//! End-to-end image builds: descriptors → module → ARM object on disk.

use std::fs;

use object::{Object, ObjectSection, ObjectSymbol};

use tarn_image::descriptor::{ArrayDescriptor, ObjectDescriptor, Payload};
use tarn_image::env::{CodePointerTarget, Environment, MethodId};
use tarn_image::{ImageConfig, ImageErrorKind, ModuleManager, TypeSystem};
use tarn_target_arm::backend::ArmBackend;
use tarn_target_arm::encode::return_stub;

/// A small program: a `Config` object pointing at a string and an int
/// array, plus a bootstrap method.
struct Program {
    ts: TypeSystem,
    bootstrap: MethodId,
    root: tarn_image::descriptor::DescriptorId,
}

fn program() -> Program {
    let mut ts = TypeSystem::new(4);
    let wk = ts.well_known().clone();

    let ints = ts.add_array_type(wk.int32);
    let config = ts.add_class("Config", wk.object, 21);
    let name = ts.add_field(config, "Name", 8, wk.string);
    let values = ts.add_field(config, "Values", 12, ints);
    let flags = ts.add_field(config, "Flags", 16, wk.byte);
    ts.add_field(config, "Entry", 17, wk.code_pointer);

    let kernel = ts.add_class("Kernel", wk.object, 8);
    let bootstrap = ts.add_method(kernel, "Bootstrap_Initialization", vec![], None, false);

    let text = ts.add_string("tarn");
    let array = ts.add_descriptor(ArrayDescriptor::new(ints, 2, false).with_source(vec![1, 0]));
    let root = ts.add_descriptor(
        ObjectDescriptor::new(config, true)
            .with_value(name, Payload::Descriptor(text))
            .with_value(values, Payload::Descriptor(array))
            .with_value(flags, Payload::Scalar(3)),
    );
    Program { ts, bootstrap, root }
}

#[test]
fn compile_emits_arm_object_with_entry_alias() {
    let p = program();
    let Ok(mut manager) = ModuleManager::new(&p.ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    manager.materialize_root(p.root).unwrap();
    let symbol = manager.function_symbol(p.bootstrap);
    assert_eq!(symbol, "Kernel::Bootstrap_Initialization_0");
    manager.add_compiled_function(return_stub(&symbol));
    manager.compile().unwrap();

    let bytes = manager.object_code().expect("object code after compile");
    let file = object::File::parse(bytes).unwrap();
    assert_eq!(file.architecture(), object::Architecture::Arm);

    let main = file.symbols().find(|s| s.name() == Ok("main")).unwrap();
    let boot = file.symbols().find(|s| s.name() == Ok(symbol.as_str())).unwrap();
    assert_eq!(main.address(), boot.address());

    // Mutable root in .data, immutable string and array with pointers in
    // .data.rel.ro.
    let section_of = |name: &str| {
        let sym = file
            .symbols()
            .find(|s| s.name() == Ok(name))
            .unwrap_or_else(|| panic!("no symbol {name}"));
        let index = sym.section_index().unwrap();
        file.section_by_index(index).unwrap().name().unwrap().to_string()
    };
    let root_name = format!("Config_{}", p.root.index());
    assert_eq!(section_of(&root_name), ".data");

    let root = file.symbols().find(|s| s.name() == Ok(root_name.as_str())).unwrap();
    // header 8 + Name 4 + Values 4 + Flags 1 + Entry 4
    assert_eq!(root.size(), 21);
}

#[test]
fn lowered_root_bytes_follow_layout() {
    let p = program();
    let Ok(mut manager) = ModuleManager::new(&p.ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    let g = manager.materialize_root(p.root).unwrap();
    manager.add_compiled_function(return_stub(&manager.function_symbol(p.bootstrap)));
    manager.compile().unwrap();

    let module = manager.module();
    let statics = tarn_target::lower::lower_globals(
        module,
        &tarn_ir::layout::DataLayout::for_module(module),
    )
    .unwrap();
    let name = module.resolve(module.global(g).name).to_string();
    let root = statics.iter().find(|s| s.name == name).unwrap();
    assert!(root.writable);
    assert_eq!(
        root.data,
        vec![
            0x08, 0, 0, 0, // multi-use word: unreclaimable
            0, 0, 0, 0, // vtable pointer
            0, 0, 0, 0, // Name
            0, 0, 0, 0, // Values
            3, // Flags
            0, 0, 0, 0, // Entry: absent code pointer
        ]
    );
    let offsets: Vec<usize> = root.relocations.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![4, 8, 12]);

    let text = statics
        .iter()
        .find(|s| s.name.starts_with("System.String_"))
        .unwrap();
    assert!(!text.writable);
    assert_eq!(&text.data[8..12], &[4, 0, 0, 0]);
    assert_eq!(&text.data[12..], b"t\0a\0r\0n\0");
}

#[test]
fn dump_text_and_binary() {
    let p = program();
    let Ok(mut manager) = ModuleManager::new(&p.ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    manager.materialize_root(p.root).unwrap();
    manager.add_compiled_function(return_stub(&manager.function_symbol(p.bootstrap)));
    manager.compile().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let text_path = dir.path().join("image.ll");
    let obj_path = dir.path().join("image.o");
    manager.dump_to_file(&text_path, true).unwrap();
    manager.dump_to_file(&obj_path, false).unwrap();

    let text = fs::read_to_string(&text_path).unwrap();
    assert!(text.starts_with("; module image (native int 32)"), "{text}");
    assert!(text.contains("alias @main = @Kernel::Bootstrap_Initialization_0"), "{text}");
    assert!(!text.contains("uninitialized"), "{text}");

    let obj = fs::read(&obj_path).unwrap();
    assert_eq!(obj, manager.object_code().unwrap());
}

#[test]
fn dump_to_missing_directory_reports_path() {
    let p = program();
    let Ok(manager) = ModuleManager::new(&p.ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("image.ll");
    let err = manager.dump_to_file(&path, true).unwrap_err();
    match err.kind {
        ImageErrorKind::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn code_pointer_relocates_against_method_symbol() {
    let mut ts = TypeSystem::new(4);
    let wk = ts.well_known().clone();
    let timer = ts.add_class("Timer", wk.object, 12);
    let callback = ts.add_field(timer, "Callback", 8, wk.code_pointer);
    let tick = ts.add_method(timer, "Tick", vec![], None, false);
    let kernel = ts.add_class("Kernel", wk.object, 8);
    let bootstrap = ts.add_method(kernel, "Bootstrap_Initialization", vec![], None, false);
    let cp = ts.add_code_pointer(CodePointerTarget::Method(tick));
    let t = ts.add_descriptor(
        ObjectDescriptor::new(timer, false).with_value(callback, Payload::CodePointer(cp)),
    );

    let Ok(mut manager) = ModuleManager::new(&ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    manager.materialize_root(t).unwrap();
    manager.add_compiled_function(return_stub(&manager.function_symbol(bootstrap)));
    manager.compile().unwrap();

    let file = object::File::parse(manager.object_code().unwrap()).unwrap();
    let tick_symbol = file
        .symbols()
        .find(|s| s.name() == Ok("Timer::Tick_0"))
        .unwrap();
    assert!(tick_symbol.is_undefined());

    let rel_ro = file.section_by_name(".data.rel.ro").unwrap();
    let targets: Vec<String> = rel_ro
        .relocations()
        .filter_map(|(_, r)| match r.target() {
            object::RelocationTarget::Symbol(i) => {
                file.symbol_by_index(i).ok()?.name().ok().map(str::to_string)
            }
            _ => None,
        })
        .collect();
    assert!(targets.iter().any(|t| t == "Timer::Tick_0"), "{targets:?}");
}

#[test]
fn handler_code_pointer_aborts_compile() {
    let mut ts = TypeSystem::new(4);
    let wk = ts.well_known().clone();
    let guard = ts.add_class("Guard", wk.object, 12);
    let on_fault = ts.add_field(guard, "OnFault", 8, wk.code_pointer);
    let cp = ts.add_code_pointer(CodePointerTarget::ExceptionHandler("fault_block".to_string()));
    let g = ts.add_descriptor(
        ObjectDescriptor::new(guard, false).with_value(on_fault, Payload::CodePointer(cp)),
    );
    let holder = ts.add_class("Holder", wk.object, 12);
    let slot = ts.add_field(holder, "Guard", 8, guard);
    let h = ts.add_descriptor(ObjectDescriptor::new(holder, false).with_value(slot, Payload::Descriptor(g)));

    let Ok(mut manager) = ModuleManager::new(&ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    // The guard is only discovered as a dependency, so the failure surfaces
    // during the sweep.
    manager.materialize_root(h).unwrap();
    let err = manager.compile().unwrap_err();
    assert!(matches!(err.kind, ImageErrorKind::UnsupportedFeature { .. }), "{err}");
    assert_eq!(err.descriptor, Some(g));
}

#[test]
fn alias_without_body_fails_emission() {
    let p = program();
    let Ok(mut manager) = ModuleManager::new(&p.ts, ImageConfig::default(), ArmBackend) else {
        panic!("manager");
    };
    manager.materialize_root(p.root).unwrap();
    let err = manager.compile().unwrap_err();
    assert!(matches!(err.kind, ImageErrorKind::Emit(_)), "{err}");
}
