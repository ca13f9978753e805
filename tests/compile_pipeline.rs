// tests/compile_pipeline.rs
//! End-to-end pipeline tests: module description in, image out.

use std::fs;
use std::path::PathBuf;

use ingot::cli::{CompileArgs, TrackingMode};
use ingot::commands::compile::run_compile;
use ingot::commands::scan::run_scan;
use ingot_types::{
    Instr, MethodData, MethodExpr, ModuleData, PrimitiveKind, SignatureData, TypeData,
    TypeDefKind, TypeExpr,
};

fn named(name: &str) -> TypeExpr {
    TypeExpr::Named {
        module: None,
        namespace: "App".to_string(),
        name: name.to_string(),
    }
}

fn mref(owner: &str, name: &str) -> MethodExpr {
    MethodExpr {
        owner: named(owner),
        name: name.to_string(),
        inst: Vec::new(),
    }
}

fn void_sig() -> SignatureData {
    SignatureData {
        params: Vec::new(),
        ret: TypeExpr::Prim(PrimitiveKind::Void),
        vararg: false,
    }
}

fn sample_module() -> ModuleData {
    ModuleData {
        name: "App".to_string(),
        entry_point: Some(mref("Program", "Main")),
        types: vec![
            TypeData {
                namespace: "App".to_string(),
                name: "Program".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![MethodData {
                    name: "Main".to_string(),
                    signature: void_sig(),
                    is_static: true,
                    body: vec![
                        Instr::Newobj(mref("Greeter", ".ctor")),
                        Instr::Callvirt(mref("Greeter", "Greet")),
                        Instr::Ldstr("hello".to_string()),
                    ],
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Greeter".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![
                    MethodData {
                        name: ".ctor".to_string(),
                        signature: void_sig(),
                        ..MethodData::default()
                    },
                    MethodData {
                        name: "Greet".to_string(),
                        signature: void_sig(),
                        is_virtual: true,
                        is_newslot: true,
                        body: vec![Instr::Ldstr("hi".to_string())],
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
        ],
        ..ModuleData::default()
    }
}

fn write_module(dir: &PathBuf, name: &str, data: &ModuleData) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(data).unwrap()).unwrap();
    path
}

fn work_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ingot-test-{}-{}", tag, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn compile_args(input: PathBuf, output: PathBuf) -> CompileArgs {
    CompileArgs {
        input,
        references: Vec::new(),
        output: Some(output),
        library: false,
        single_method: None,
        root_canonical_code: false,
        no_generic_code: false,
        only_canonical_code: false,
        verbose: false,
        track: TrackingMode::First,
    }
}

#[test]
fn compile_produces_image() {
    let dir = work_dir("image");
    let input = write_module(&dir, "app.json", &sample_module());
    let output = dir.join("app.image.json");

    run_compile(&compile_args(input, output.clone())).unwrap();

    let image: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let symbols = image["symbols"].as_array().unwrap();
    assert!(!symbols.is_empty());

    let methods = image["methods"].as_array().unwrap();
    let names: Vec<&str> = methods
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"App.Program.Main"));
    assert!(names.contains(&"App.Greeter.Greet"));

    // The entry point is exported as main.
    let exports = image["exports"].as_array().unwrap();
    assert!(exports.iter().any(|e| e.as_str().unwrap().starts_with("main = ")));

    // Main references the string literal through a relocation.
    let main = methods
        .iter()
        .find(|m| m["name"] == "App.Program.Main")
        .unwrap();
    let relocs = main["relocs"].as_array().unwrap();
    assert!(relocs
        .iter()
        .any(|r| r["symbol"].as_str().unwrap().starts_with("StringLiteral")));
}

#[test]
fn compile_is_deterministic() {
    let dir = work_dir("determinism");
    let input = write_module(&dir, "app.json", &sample_module());

    let out_a = dir.join("a.image.json");
    let out_b = dir.join("b.image.json");
    run_compile(&compile_args(input.clone(), out_a.clone())).unwrap();
    run_compile(&compile_args(input, out_b.clone())).unwrap();

    assert_eq!(
        fs::read_to_string(out_a).unwrap(),
        fs::read_to_string(out_b).unwrap()
    );
}

#[test]
fn scan_command_runs() {
    let dir = work_dir("scan");
    let input = write_module(&dir, "app.json", &sample_module());
    let output = dir.join("unused.json");
    run_scan(&compile_args(input, output)).unwrap();
}

#[test]
fn missing_entry_point_is_not_fatal() {
    let dir = work_dir("noentry");
    let mut module = sample_module();
    module.entry_point = None;
    let input = write_module(&dir, "app.json", &module);
    let output = dir.join("app.image.json");

    // No roots means an empty image, not a crash.
    run_compile(&compile_args(input, output.clone())).unwrap();
    let image: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert!(image["symbols"].as_array().unwrap().is_empty());
}
