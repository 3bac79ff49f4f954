use std::fs;

use tarn_image::descriptor::{DataDescriptor, Payload};
use tarn_image::env::{CodePointerTarget, Environment};

use crate::schema::{Description, DescriptionError};
use crate::{Cli, ToolError, run};

const PROGRAM: &str = r#"{
  "types": [
    { "name": "Config", "kind": "class", "size": 21,
      "fields": [
        { "name": "Name", "offset": 8, "type": "System.String" },
        { "name": "Values", "offset": 12, "type": "System.Int32[]" },
        { "name": "Flags", "offset": 16, "type": "System.Byte" },
        { "name": "Entry", "offset": 17, "type": "Microsoft.Zelig.Runtime.CodePointer" }
      ] },
    { "name": "Kernel", "kind": "class", "size": 8 }
  ],
  "methods": [
    { "owner": "Kernel", "name": "Bootstrap_Initialization" },
    { "owner": "Kernel", "name": "Tick" }
  ],
  "values": [
    { "name": "config", "kind": "object", "type": "Config", "mutable": true,
      "fields": {
        "Name": { "value": "banner" },
        "Values": { "value": "table" },
        "Flags": { "scalar": 3 },
        "Entry": { "method": "Tick" }
      } },
    { "name": "banner", "kind": "string", "text": "tarn" },
    { "name": "table", "kind": "array", "type": "System.Int32[]", "source": [1, -1] }
  ],
  "roots": ["config"]
}"#;

fn cli(description: &std::path::Path, output: &std::path::Path, text: bool) -> Cli {
    Cli {
        description: description.to_path_buf(),
        output: output.to_path_buf(),
        text,
        config: None,
        no_validate: false,
    }
}

#[test]
fn build_resolves_names() {
    let image = Description::from_json(PROGRAM).unwrap().build(4).unwrap();
    let ts = &image.types;
    assert_eq!(image.roots.len(), 1);

    let config = ts.find_type("Config").unwrap();
    assert_eq!(ts.type_def(config).extends, Some(ts.well_known().object));
    assert!(ts.find_type("System.Int32[]").is_some());

    let Some(DataDescriptor::Object(root)) = ts.descriptor(image.roots[0]) else {
        panic!("root is not an object");
    };
    assert!(root.is_mutable);
    let flags = ts.find_field(config, "Flags").unwrap();
    assert_eq!(root.values.get(&flags), Some(&Payload::Scalar(3)));

    let entry = ts.find_field(config, "Entry").unwrap();
    let Some(&Payload::CodePointer(cp)) = root.values.get(&entry) else {
        panic!("entry is not a code pointer");
    };
    let tick = ts.find_method("Tick").unwrap();
    assert_eq!(ts.code_pointer(cp), Some(&CodePointerTarget::Method(tick)));

    let values = ts.find_field(config, "Values").unwrap();
    let Some(&Payload::Descriptor(table)) = root.values.get(&values) else {
        panic!("values is not a reference");
    };
    let Some(DataDescriptor::Array(arr)) = ts.descriptor(table) else {
        panic!("table is not an array");
    };
    assert_eq!(arr.length, 2);
    assert_eq!(arr.source, Some(vec![1, u64::MAX]));
}

#[test]
fn nested_values_point_at_their_container() {
    let text = r#"{
      "types": [
        { "name": "Pair", "kind": "value_type", "size": 8,
          "fields": [{ "name": "A", "offset": 0, "type": "System.Int32" },
                     { "name": "B", "offset": 4, "type": "System.Int32" }] },
        { "name": "Holder", "kind": "class", "size": 16,
          "fields": [{ "name": "P", "offset": 8, "type": "Pair" }] }
      ],
      "values": [
        { "name": "h", "kind": "object", "type": "Holder", "fields": { "P": { "value": "p" } } },
        { "name": "p", "kind": "object", "type": "Pair", "nested_in": "h",
          "fields": { "A": { "scalar": 1 } } }
      ],
      "roots": ["h"]
    }"#;
    let image = Description::from_json(text).unwrap().build(4).unwrap();
    let h = image.roots[0];
    let nested = image
        .types
        .descriptor(tarn_image::descriptor::DescriptorId(h.index() + 1))
        .unwrap();
    assert_eq!(nested.nesting(), Some(h));
}

#[test]
fn unresolved_names_are_reported() {
    let cases = [
        (
            r#"{ "types": [{ "name": "A", "kind": "class", "size": 8, "base": "Missing" }] }"#,
            "unknown type `Missing`",
        ),
        (
            r#"{ "types": [{ "name": "A", "kind": "class", "size": 8 }],
                 "values": [{ "name": "a", "kind": "object", "type": "A",
                              "fields": { "Nope": "null" } }] }"#,
            "type `A` has no field `Nope`",
        ),
        (r#"{ "roots": ["ghost"] }"#, "unknown value `ghost`"),
        (
            r#"{ "types": [{ "name": "Int128", "kind": "scalar", "size": 16 }] }"#,
            "scalar `Int128` is 16 bytes wide, encodable widths are 1 to 8",
        ),
        (
            r#"{ "values": [{ "name": "s", "kind": "string", "text": "a" },
                            { "name": "s", "kind": "string", "text": "b" }] }"#,
            "value `s` is defined twice",
        ),
    ];
    for (text, expected) in cases {
        let err = Description::from_json(text).unwrap().build(4).err().unwrap();
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn unknown_method_in_code_pointer() {
    let text = r#"{
      "types": [{ "name": "T", "kind": "class", "size": 12,
                  "fields": [{ "name": "F", "offset": 8,
                               "type": "Microsoft.Zelig.Runtime.CodePointer" }] }],
      "values": [{ "name": "t", "kind": "object", "type": "T",
                   "fields": { "F": { "method": "Gone" } } }]
    }"#;
    let err = Description::from_json(text).unwrap().build(4).err().unwrap();
    assert!(matches!(err, DescriptionError::UnknownMethod(ref m) if m == "Gone"));
}

#[test]
fn malformed_json_is_a_description_error() {
    let err = Description::from_json(r#"{ "types": 3 }"#).unwrap_err();
    assert!(matches!(err, DescriptionError::Json(_)));
}

#[test]
fn run_writes_text_image() {
    let dir = tempfile::tempdir().unwrap();
    let description = dir.path().join("program.json");
    let output = dir.path().join("image.txt");
    fs::write(&description, PROGRAM).unwrap();

    run(&cli(&description, &output, true)).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("; module image (native int 32)"), "{text}");
    assert!(text.contains("@Config_"), "{text}");
    assert!(text.contains("alias @main = @Kernel::Bootstrap_Initialization_"), "{text}");
    assert!(text.contains("@Kernel::Tick_"), "{text}");
}

#[test]
fn run_writes_elf_object() {
    let dir = tempfile::tempdir().unwrap();
    let description = dir.path().join("program.json");
    let output = dir.path().join("image.o");
    fs::write(&description, PROGRAM).unwrap();

    run(&cli(&description, &output, false)).unwrap();

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[..4], b"\x7fELF");
}

#[test]
fn run_uses_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let description = dir.path().join("program.json");
    let config = dir.path().join("config.json");
    let output = dir.path().join("image.txt");
    fs::write(&description, PROGRAM).unwrap();
    fs::write(&config, r#"{ "image_name": "kernel", "entry_symbol": "_start" }"#).unwrap();

    let mut args = cli(&description, &output, true);
    args.config = Some(config);
    run(&args).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("; module kernel"), "{text}");
    assert!(text.contains("alias @_start = "), "{text}");
}

#[test]
fn run_reports_missing_description() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let err = run(&cli(&missing, &dir.path().join("out"), true)).unwrap_err();
    assert!(matches!(err, ToolError::Read { ref path, .. } if *path == missing));
}

#[test]
fn run_resolves_inline_code_pointer_value() {
    let text = r#"{
      "types": [
        { "name": "Timer", "kind": "class", "size": 12,
          "fields": [{ "name": "Callback", "offset": 8,
                       "type": "Microsoft.Zelig.Runtime.CodePointer" }] },
        { "name": "Kernel", "kind": "class", "size": 8 }
      ],
      "methods": [
        { "owner": "Kernel", "name": "Bootstrap_Initialization" },
        { "owner": "Timer", "name": "Tick" }
      ],
      "values": [
        { "name": "timer", "kind": "object", "type": "Timer",
          "fields": { "Callback": { "value": "callback" } } },
        { "name": "callback", "kind": "object", "type": "Microsoft.Zelig.Runtime.CodePointer",
          "nested_in": "timer", "fields": { "Target": { "method": "Tick" } } }
      ],
      "roots": ["timer"]
    }"#;
    let dir = tempfile::tempdir().unwrap();
    let description = dir.path().join("timer.json");
    let output = dir.path().join("image.txt");
    fs::write(&description, text).unwrap();

    run(&cli(&description, &output, true)).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("ptr @Timer::Tick_1"), "{text}");
    assert!(text.contains("declare @Timer::Tick_1()"), "{text}");
}
