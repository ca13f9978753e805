// tests.rs

use smallvec::smallvec;

use ingot_identity::{MethodId, ModuleId};
use ingot_types::{
    CanonKind, FieldData, GenericParamData, Instr, MethodData, MethodExpr, ModuleData,
    PrimitiveKind, SignatureData, SingleFileGroup, TypeData, TypeDefKind, TypeExpr,
    TypeSystemContext, Variance,
};

use crate::backend::{CodegenBackend, MethodCode};
use crate::compilation::{compile, CompiledImage};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::ilscan;
use crate::key::NodeKey;
use crate::metadata::{EmptyMetadataManager, ScannerMetadataManager, UsageBasedMetadataManager};
use crate::oracles::ScanResults;
use crate::provider::DependencyCollector;
use crate::roots::{LibraryRoot, ModuleEntrypointRoot, SingleMethodRoot};
use crate::scanner::scan;

/// Minimal backend: walks the summary the same way the scanner does and
/// emits one byte per instruction.
struct TestBackend;

impl CodegenBackend for TestBackend {
    fn compile_method(
        &mut self,
        method: MethodId,
        deps: &mut DependencyCollector,
    ) -> CompileResult<MethodCode> {
        let Some(body) = deps.env.ctx.method_body(method)? else {
            return Ok(MethodCode::default());
        };
        let bctx = ilscan::BodyContext::for_method(deps.env.ctx, method);
        let mut bytes = Vec::new();
        for instr in &body {
            ilscan::record_instruction(deps, &bctx, instr)?;
            bytes.push(0x90);
        }
        bytes.push(0xc3);
        Ok(MethodCode {
            bytes,
            ..MethodCode::default()
        })
    }
}

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

fn ctor() -> MethodData {
    MethodData {
        name: ".ctor".to_string(),
        signature: void_sig(),
        ..MethodData::default()
    }
}

fn fixture(main_body: Vec<Instr>) -> ModuleData {
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
                    body: main_body,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Animal".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![
                    ctor(),
                    MethodData {
                        name: "Speak".to_string(),
                        signature: void_sig(),
                        is_virtual: true,
                        is_newslot: true,
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Dog".to_string(),
                kind: TypeDefKind::Class,
                base: Some(named("Animal")),
                methods: vec![
                    ctor(),
                    MethodData {
                        name: "Speak".to_string(),
                        signature: void_sig(),
                        is_virtual: true,
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Leaf".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![
                    ctor(),
                    MethodData {
                        name: "Bark".to_string(),
                        signature: void_sig(),
                        is_virtual: true,
                        is_newslot: true,
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "IFoo".to_string(),
                kind: TypeDefKind::Interface,
                is_abstract: true,
                methods: vec![MethodData {
                    name: "M".to_string(),
                    signature: void_sig(),
                    is_virtual: true,
                    is_newslot: true,
                    is_abstract: true,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "S".to_string(),
                kind: TypeDefKind::Class,
                interfaces: vec![named("IFoo")],
                methods: vec![
                    ctor(),
                    MethodData {
                        name: "M".to_string(),
                        signature: void_sig(),
                        is_virtual: true,
                        is_newslot: true,
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Gen`1".to_string(),
                kind: TypeDefKind::Class,
                generic_params: vec![GenericParamData {
                    name: "T".to_string(),
                    variance: Variance::Invariant,
                }],
                methods: vec![
                    ctor(),
                    MethodData {
                        name: "Get".to_string(),
                        signature: SignatureData {
                            params: Vec::new(),
                            ret: TypeExpr::TypeVar(0),
                            vararg: false,
                        },
                        ..MethodData::default()
                    },
                ],
                ..TypeData::default()
            },
            // F<T>(n) calls F<Gen<T>>(n-1): the classic generic recursion.
            TypeData {
                namespace: "App".to_string(),
                name: "Recursive".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![MethodData {
                    name: "Rec".to_string(),
                    signature: void_sig(),
                    is_static: true,
                    generic_params: vec!["T".to_string()],
                    body: vec![Instr::Call(MethodExpr {
                        owner: named("Recursive"),
                        name: "Rec".to_string(),
                        inst: vec![TypeExpr::Inst {
                            def: Box::new(named("Gen`1")),
                            args: vec![TypeExpr::MethodVar(0)],
                        }],
                    })],
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Statics".to_string(),
                kind: TypeDefKind::Class,
                fields: vec![FieldData {
                    name: "Counter".to_string(),
                    ty: TypeExpr::Prim(PrimitiveKind::I32),
                    is_static: true,
                    rva: None,
                }],
                methods: vec![MethodData {
                    name: ".cctor".to_string(),
                    signature: void_sig(),
                    is_static: true,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
        ],
        ..ModuleData::default()
    }
}

fn load(main_body: Vec<Instr>) -> (TypeSystemContext, ModuleId) {
    let ctx = TypeSystemContext::new();
    let module = ctx.load_module(fixture(main_body)).unwrap();
    (ctx, module)
}

fn scan_entry(ctx: &TypeSystemContext, module: ModuleId, config: &CompilerConfig) -> ScanResults {
    let group = SingleFileGroup::new(ctx);
    let metadata = EmptyMetadataManager;
    let roots = ModuleEntrypointRoot::new(module);
    scan(ctx, &group, config, &metadata, &[&roots]).unwrap()
}

fn compile_entry(
    ctx: &TypeSystemContext,
    module: ModuleId,
    config: &CompilerConfig,
    results: &ScanResults,
) -> CompileResult<CompiledImage> {
    let group = SingleFileGroup::new(ctx);
    let metadata = EmptyMetadataManager;
    let roots = ModuleEntrypointRoot::new(module);
    let mut backend = TestBackend;
    compile(
        ctx,
        &group,
        config,
        &metadata,
        results,
        &mut backend,
        &[&roots],
    )
}

fn find_method(ctx: &TypeSystemContext, module: ModuleId, type_name: &str, name: &str) -> MethodId {
    let ty = ctx.get_type(module, "App", type_name).unwrap();
    ctx.methods_of(ty)
        .into_iter()
        .find(|&m| ctx.method_name(m) == name)
        .unwrap()
}

#[test]
fn test_direct_call_closure() {
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Ldstr("hello".to_string()),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let dog = ctx.get_type(module, "App", "Dog").unwrap();
    assert!(results.is_constructed(dog));
    // Construction closes over the base chain.
    let animal = ctx.get_type(module, "App", "Animal").unwrap();
    assert!(results.is_constructed(animal));
    assert!(results.is_constructed(ctx.well_known().object));
    let dog_ctor = find_method(&ctx, module, "Dog", ".ctor");
    assert!(results.was_compiled(dog_ctor));
    // Nothing called Speak, so no override body was needed.
    let dog_speak = find_method(&ctx, module, "Dog", "Speak");
    assert!(!results.was_compiled(dog_speak));
}

#[test]
fn test_conditional_override_fires_with_call_and_construction() {
    // Both endpoints present: constructed Dog and a call through
    // Animal.Speak bring in Dog's override.
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let dog_speak = find_method(&ctx, module, "Dog", "Speak");
    assert!(results.was_compiled(dog_speak));
}

#[test]
fn test_conditional_override_needs_construction() {
    // The slot is called but Dog is never constructed: no Dog.Speak body.
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Animal", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let animal_speak = find_method(&ctx, module, "Animal", "Speak");
    let dog_speak = find_method(&ctx, module, "Dog", "Speak");
    assert!(results.was_compiled(animal_speak));
    assert!(!results.was_compiled(dog_speak));
}

#[test]
fn test_interface_dispatch_scenario() {
    // S2: with S constructed, calling IFoo.M brings in S.M exactly.
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("S", ".ctor")),
        Instr::Callvirt(mref("IFoo", "M")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let s_m = find_method(&ctx, module, "S", "M");
    assert!(results.was_compiled(s_m));
}

#[test]
fn test_interface_dispatch_without_call() {
    // Conditional soundness: construction alone does not pull the
    // implementation in.
    let (ctx, module) = load(vec![Instr::Newobj(mref("S", ".ctor"))]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let s_m = find_method(&ctx, module, "S", "M");
    assert!(!results.was_compiled(s_m));
}

#[test]
fn test_generic_recursion_terminates_with_one_canonical_body() {
    // S1: rooting Rec<Object> must converge on a single shared body.
    let (ctx, module) = load(vec![]);
    let rec = find_method(&ctx, module, "Recursive", "Rec");
    let object = ctx.well_known().object;
    let rec_object = ctx.instantiated_method(rec, smallvec![object]);

    let config = CompilerConfig::default();
    let group = SingleFileGroup::new(&ctx);
    let metadata = EmptyMetadataManager;
    let roots = SingleMethodRoot::new(rec_object);
    let results = scan(&ctx, &group, &config, &metadata, &[&roots]).unwrap();

    let canonical = ctx.canonical_method_target(rec_object, CanonKind::Specific);
    assert!(results.was_compiled(canonical));
    // Exactly one Rec body: every instantiation shares the canonical one.
    let rec_bodies = results
        .compiled_methods()
        .filter(|&m| ctx.method_name(m) == "Rec")
        .count();
    assert_eq!(rec_bodies, 1);
    // The canonical body recorded its recursive call in the dictionary.
    let layout = results.dictionary_layout(canonical).unwrap();
    assert!(!layout.entries().is_empty());
}

#[test]
fn test_effectively_sealed_oracle() {
    // S3: Leaf has no constructed subtypes, Animal does (Dog).
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Newobj(mref("Leaf", ".ctor")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);

    let leaf = ctx.get_type(module, "App", "Leaf").unwrap();
    let animal = ctx.get_type(module, "App", "Animal").unwrap();
    let ifoo = ctx.get_type(module, "App", "IFoo").unwrap();
    assert!(results.is_effectively_sealed(&ctx, leaf));
    assert!(!results.is_effectively_sealed(&ctx, animal));
    assert!(!results.is_effectively_sealed(&ctx, ifoo));
}

#[test]
fn test_devirtualization_in_compile_pass() {
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Leaf", ".ctor")),
        Instr::Callvirt(mref("Leaf", "Bark")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);
    let image = compile_entry(&ctx, module, &config, &results).unwrap();

    // The call through the effectively sealed Leaf was made direct: the
    // compiled image carries no virtual slot use for Bark.
    let bark = find_method(&ctx, module, "Leaf", "Bark");
    let has_use = image
        .marked
        .iter()
        .any(|n| matches!(n.key, NodeKey::VirtualMethodUse(decl) if decl == bark));
    assert!(!has_use);
    assert!(image.methods.iter().any(|m| m.method == bark));
}

#[test]
fn test_compiler_marked_set_is_subset_of_scan() {
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
        Instr::Newobj(mref("S", ".ctor")),
        Instr::Callvirt(mref("IFoo", "M")),
        Instr::Ldsfld(ingot_types::FieldExpr {
            owner: named("Statics"),
            name: "Counter".to_string(),
        }),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);
    let image = compile_entry(&ctx, module, &config, &results).unwrap();

    for record in &image.methods {
        assert!(
            results.was_compiled(record.method),
            "compiled method '{}' was not in the scan closure",
            record.name
        );
        assert!(!record.code.is_empty());
    }
}

#[test]
fn test_static_access_pulls_cctor() {
    let (ctx, module) = load(vec![Instr::Ldsfld(ingot_types::FieldExpr {
        owner: named("Statics"),
        name: "Counter".to_string(),
    })]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);
    let cctor = find_method(&ctx, module, "Statics", ".cctor");
    assert!(results.was_compiled(cctor));
}

#[test]
fn test_scanner_miss_is_fatal() {
    // S5: tamper with the oracle so the compiler demands a body the
    // scanner never predicted.
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
    ]);
    let config = CompilerConfig::default();
    let mut results = scan_entry(&ctx, module, &config);
    let dog_ctor = find_method(&ctx, module, "Dog", ".ctor");
    results.compiled_methods.remove(&dog_ctor);

    let err = compile_entry(&ctx, module, &config, &results).unwrap_err();
    assert!(matches!(err, CompileError::ScannerFailed { .. }));
    assert!(err.to_string().contains("dependency chain"));
}

#[test]
fn test_scanner_vtable_miss_is_fatal() {
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
    ]);
    let config = CompilerConfig::default();
    let mut results = scan_entry(&ctx, module, &config);
    let animal = ctx.get_type(module, "App", "Animal").unwrap();
    results.vtable_layouts.remove(&animal);
    // Keep Animal unsealed so the call stays virtual and hits the layout.
    let err = compile_entry(&ctx, module, &config, &results).unwrap_err();
    assert!(matches!(err, CompileError::ScannerFailed { .. }));
}

#[test]
fn test_library_rooting_with_canonical_code() {
    // S4: with canonical rooting, Gen<T> roots as Gen<__Canon>.
    let (ctx, module) = load(vec![]);
    let group = SingleFileGroup::new(&ctx);
    let metadata = EmptyMetadataManager;
    let roots = LibraryRoot::new(vec![module]);

    let config = CompilerConfig {
        root_canonical_code: true,
        ..CompilerConfig::default()
    };
    let results = scan(&ctx, &group, &config, &metadata, &[&roots]).unwrap();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let canon = ctx.well_known().canon;
    let gen_canon = ctx.instantiated_type(r#gen, smallvec![canon]);
    let get = ctx
        .methods_of(gen_canon)
        .into_iter()
        .find(|&m| ctx.method_name(m) == "Get")
        .unwrap();
    assert!(results.was_compiled(get));

    // Without the toggle, generic definitions are not rooted.
    let config = CompilerConfig::default();
    let results = scan(&ctx, &group, &config, &metadata, &[&roots]).unwrap();
    assert!(!results.was_compiled(get));
}

#[test]
fn test_no_generic_code_toggle() {
    let (ctx, module) = load(vec![Instr::Newobj(MethodExpr {
        owner: TypeExpr::Inst {
            def: Box::new(named("Gen`1")),
            args: vec![TypeExpr::Prim(PrimitiveKind::I32)],
        },
        name: ".ctor".to_string(),
        inst: Vec::new(),
    })]);
    let config = CompilerConfig {
        no_generic_code: true,
        ..CompilerConfig::default()
    };
    let results = scan_entry(&ctx, module, &config);
    let image = compile_entry(&ctx, module, &config, &results).unwrap();

    // The generic ctor is marked but compiled to an empty body.
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let i32_ty = ctx.well_known().i32;
    let gen_i32 = ctx.instantiated_type(r#gen, smallvec![i32_ty]);
    let gen_ctor = ctx
        .methods_of(gen_i32)
        .into_iter()
        .find(|&m| ctx.method_name(m) == ".ctor")
        .unwrap();
    assert!(results.was_compiled(gen_ctor));
    assert!(!image.methods.iter().any(|m| m.method == gen_ctor));
}

#[test]
fn test_deterministic_marked_order() {
    let body = || {
        vec![
            Instr::Newobj(mref("Dog", ".ctor")),
            Instr::Callvirt(mref("Animal", "Speak")),
            Instr::Ldstr("x".to_string()),
        ]
    };
    let run = |body: Vec<Instr>| {
        let ctx = TypeSystemContext::new();
        let module = ctx.load_module(fixture(body)).unwrap();
        let config = CompilerConfig::default();
        let results = scan_entry(&ctx, module, &config);
        let image = compile_entry(&ctx, module, &config, &results).unwrap();
        image.marked.iter().map(|n| n.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(run(body()), run(body()));
}

#[test]
fn test_inlining_oracle() {
    let (ctx, module) = load(vec![
        Instr::Newobj(mref("Dog", ".ctor")),
        Instr::Callvirt(mref("Animal", "Speak")),
    ]);
    let config = CompilerConfig::default();
    let results = scan_entry(&ctx, module, &config);
    let group = SingleFileGroup::new(&ctx);

    let main = find_method(&ctx, module, "Program", "Main");
    let dog_ctor = find_method(&ctx, module, "Dog", ".ctor");
    let leaf_bark = find_method(&ctx, module, "Leaf", "Bark");
    // Dog was constructed: its methods inline. Leaf was not.
    assert!(results.can_inline(&ctx, &group, main, dog_ctor));
    assert!(!results.can_inline(&ctx, &group, main, leaf_bark));
    // Statics are always inlineable inside the bubble.
    assert!(results.can_inline(&ctx, &group, main, main));
}

#[test]
fn test_usage_based_metadata_flows_to_image() {
    let (ctx, module) = load(vec![Instr::Newobj(mref("Dog", ".ctor"))]);
    let config = CompilerConfig::default();
    let group = SingleFileGroup::new(&ctx);
    let scan_metadata = ScannerMetadataManager::default();
    let roots = ModuleEntrypointRoot::new(module);
    let results = scan(&ctx, &group, &config, &scan_metadata, &[&roots]).unwrap();
    assert!(!results.invokable_methods().is_empty());

    let compile_metadata = UsageBasedMetadataManager::from_scan(&results);
    let mut backend = TestBackend;
    let image = compile(
        &ctx,
        &group,
        &config,
        &compile_metadata,
        &results,
        &mut backend,
        &[&roots],
    )
    .unwrap();
    assert!(!image.metadata.blob.is_empty());
    assert!(!image.metadata.method_map.is_empty());
}
