// tests.rs

use smallvec::smallvec;

use ingot_identity::ModuleId;

use crate::context::TypeSystemContext;
use crate::desc::{CanonKind, PrimitiveKind, TypeIdVec, Variance};
use crate::error::TypeSystemError;
use crate::module::{
    FieldData, GenericParamData, MethodData, ModuleData, SectionData, SignatureData, TypeData,
    TypeDefKind, TypeExpr,
};

fn named(name: &str) -> TypeExpr {
    TypeExpr::Named {
        module: None,
        namespace: "App".to_string(),
        name: name.to_string(),
    }
}

fn void_sig() -> SignatureData {
    SignatureData {
        params: Vec::new(),
        ret: TypeExpr::Prim(PrimitiveKind::Void),
        vararg: false,
    }
}

fn virtual_method(name: &str) -> MethodData {
    MethodData {
        name: name.to_string(),
        signature: void_sig(),
        is_virtual: true,
        is_newslot: true,
        ..MethodData::default()
    }
}

fn override_method(name: &str) -> MethodData {
    MethodData {
        name: name.to_string(),
        signature: void_sig(),
        is_virtual: true,
        ..MethodData::default()
    }
}

fn test_module() -> ModuleData {
    ModuleData {
        name: "App".to_string(),
        types: vec![
            TypeData {
                namespace: "App".to_string(),
                name: "Animal".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![
                    MethodData {
                        name: ".ctor".to_string(),
                        signature: void_sig(),
                        ..MethodData::default()
                    },
                    virtual_method("Speak"),
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Dog".to_string(),
                kind: TypeDefKind::Class,
                base: Some(named("Animal")),
                methods: vec![override_method("Speak"), virtual_method("Fetch")],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Point".to_string(),
                kind: TypeDefKind::ValueType,
                fields: vec![
                    FieldData {
                        name: "x".to_string(),
                        ty: TypeExpr::Prim(PrimitiveKind::I32),
                        is_static: false,
                        rva: None,
                    },
                    FieldData {
                        name: "y".to_string(),
                        ty: TypeExpr::Prim(PrimitiveKind::I32),
                        is_static: false,
                        rva: None,
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
                methods: vec![MethodData {
                    name: "Get".to_string(),
                    signature: SignatureData {
                        params: Vec::new(),
                        ret: TypeExpr::TypeVar(0),
                        vararg: false,
                    },
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "VGen`1".to_string(),
                kind: TypeDefKind::ValueType,
                generic_params: vec![GenericParamData {
                    name: "T".to_string(),
                    variance: Variance::Invariant,
                }],
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
                methods: vec![virtual_method("M")],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "IRo`1".to_string(),
                kind: TypeDefKind::Interface,
                is_abstract: true,
                generic_params: vec![GenericParamData {
                    name: "T".to_string(),
                    variance: Variance::Covariant,
                }],
                methods: vec![MethodData {
                    name: "Get".to_string(),
                    signature: SignatureData {
                        params: Vec::new(),
                        ret: TypeExpr::TypeVar(0),
                        vararg: false,
                    },
                    is_virtual: true,
                    is_newslot: true,
                    is_abstract: true,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "DogSource".to_string(),
                kind: TypeDefKind::Class,
                interfaces: vec![TypeExpr::Inst {
                    def: Box::new(named("IRo`1")),
                    args: vec![named("Dog")],
                }],
                methods: vec![MethodData {
                    name: "Get".to_string(),
                    signature: SignatureData {
                        params: Vec::new(),
                        ret: named("Dog"),
                        vararg: false,
                    },
                    is_virtual: true,
                    is_newslot: true,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Blobs".to_string(),
                kind: TypeDefKind::Class,
                fields: vec![
                    FieldData {
                        name: "Eight".to_string(),
                        ty: TypeExpr::Prim(PrimitiveKind::I64),
                        is_static: true,
                        rva: Some(0x1000),
                    },
                    FieldData {
                        name: "Overrun".to_string(),
                        ty: TypeExpr::Prim(PrimitiveKind::I64),
                        is_static: true,
                        rva: Some(0x2004),
                    },
                ],
                ..TypeData::default()
            },
            TypeData {
                namespace: "App".to_string(),
                name: "Varargs".to_string(),
                kind: TypeDefKind::Class,
                methods: vec![MethodData {
                    name: "Bad".to_string(),
                    signature: SignatureData {
                        params: Vec::new(),
                        ret: TypeExpr::Prim(PrimitiveKind::Void),
                        vararg: true,
                    },
                    is_static: true,
                    ..MethodData::default()
                }],
                ..TypeData::default()
            },
        ],
        sections: vec![
            SectionData {
                rva: 0x1000,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            },
            SectionData {
                rva: 0x2000,
                data: vec![9, 9, 9, 9, 9, 9, 9, 9],
            },
        ],
        ..ModuleData::default()
    }
}

fn load() -> (TypeSystemContext, ModuleId) {
    let ctx = TypeSystemContext::new();
    let module = ctx.load_module(test_module()).unwrap();
    (ctx, module)
}

#[test]
fn test_interning_identity() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;

    let a = ctx.instantiated_type(r#gen, smallvec![string]);
    let b = ctx.instantiated_type(r#gen, smallvec![string]);
    assert_eq!(a, b);

    let arr_a = ctx.array_type(a);
    let arr_b = ctx.array_type(b);
    assert_eq!(arr_a, arr_b);

    assert_eq!(
        ctx.get_type(module, "App", "Dog").unwrap(),
        ctx.get_type(module, "App", "Dog").unwrap()
    );
}

#[test]
fn test_missing_type_fails_with_type_load() {
    let (ctx, module) = load();
    let err = ctx.get_type(module, "App", "Nope").unwrap_err();
    assert!(matches!(err, TypeSystemError::TypeLoad { .. }));
}

#[test]
fn test_canon_idempotent() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;
    let inst = ctx.instantiated_type(r#gen, smallvec![string]);

    for kind in [CanonKind::Specific, CanonKind::Universal] {
        let once = ctx.convert_to_canon_form(inst, kind);
        let twice = ctx.convert_to_canon_form(once, kind);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_canon_collapses_reference_args() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;
    let canon = ctx.well_known().canon;

    let inst = ctx.instantiated_type(r#gen, smallvec![string]);
    let expected = ctx.instantiated_type(r#gen, smallvec![canon]);
    assert_eq!(ctx.convert_to_canon_form(inst, CanonKind::Specific), expected);
    assert!(ctx.is_canonical_subtype(expected, CanonKind::Specific));
    assert!(!ctx.is_canonical_subtype(expected, CanonKind::Universal));
}

#[test]
fn test_canon_preserves_value_args() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let point = ctx.get_type(module, "App", "Point").unwrap();
    let inst = ctx.instantiated_type(r#gen, smallvec![point]);

    // Specific keeps value-type identity; Universal collapses it.
    assert_eq!(ctx.convert_to_canon_form(inst, CanonKind::Specific), inst);
    let universal = ctx.well_known().universal_canon;
    let expected = ctx.instantiated_type(r#gen, smallvec![universal]);
    assert_eq!(
        ctx.convert_to_canon_form(inst, CanonKind::Universal),
        expected
    );
}

#[test]
fn test_canon_recurses_into_value_instantiations() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let vgen = ctx.get_type(module, "App", "VGen`1").unwrap();
    let string = ctx.well_known().string;
    let canon = ctx.well_known().canon;

    // Gen<VGen<String>>: the VGen arg stays a value type but its own
    // reference argument collapses.
    let vgen_string = ctx.instantiated_type(vgen, smallvec![string]);
    let outer = ctx.instantiated_type(r#gen, smallvec![vgen_string]);
    let vgen_canon = ctx.instantiated_type(vgen, smallvec![canon]);
    let expected = ctx.instantiated_type(r#gen, smallvec![vgen_canon]);
    assert_eq!(
        ctx.convert_to_canon_form(outer, CanonKind::Specific),
        expected
    );
}

#[test]
fn test_canon_commutes_with_instantiation() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let dog = ctx.get_type(module, "App", "Dog").unwrap();
    let point = ctx.get_type(module, "App", "Point").unwrap();

    let arg_sets: [TypeIdVec; 2] = [smallvec![dog], smallvec![point]];
    for args in arg_sets {
        let inst = ctx.instantiated_type(r#gen, args.clone());
        let canon_whole = ctx.convert_to_canon_form(inst, CanonKind::Specific);
        let canon_args: TypeIdVec = args
            .iter()
            .map(|&a| ctx.canonical_arg(a, CanonKind::Specific))
            .collect();
        let canon_parts = ctx.instantiated_type(r#gen, canon_args);
        assert_eq!(canon_whole, canon_parts);
    }
}

#[test]
fn test_substitution_fixed_point() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;
    let i32_ty = ctx.well_known().i32;

    let inst = ctx.instantiated_type(r#gen, smallvec![string]);
    // A fully instantiated type is a fixed point of substitution.
    assert_eq!(ctx.instantiate_type(inst, &[i32_ty], &[]), inst);
}

#[test]
fn test_signature_instantiation() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;
    let inst = ctx.instantiated_type(r#gen, smallvec![string]);

    let methods = ctx.methods_of(inst);
    assert_eq!(methods.len(), 1);
    let get = methods[0];
    let sig = ctx.method_signature(get).unwrap();
    assert_eq!(ctx.signature(sig).ret, string);
}

#[test]
fn test_vararg_signature_is_bad_image() {
    let (ctx, module) = load();
    let varargs = ctx.get_type(module, "App", "Varargs").unwrap();
    let bad = ctx.methods_of(varargs)[0];
    let err = ctx.method_signature(bad).unwrap_err();
    assert!(matches!(err, TypeSystemError::BadImageFormat { .. }));
}

#[test]
fn test_virtual_slot_order_and_override() {
    let (ctx, module) = load();
    let animal = ctx.get_type(module, "App", "Animal").unwrap();
    let dog = ctx.get_type(module, "App", "Dog").unwrap();

    // Object's slots come first, then Animal's Speak, then Dog's Fetch.
    let object_slots = ctx.enum_all_virtual_slots(ctx.well_known().object).unwrap();
    let dog_slots = ctx.enum_all_virtual_slots(dog).unwrap();
    assert_eq!(dog_slots.len(), object_slots.len() + 2);

    let speak_decl = dog_slots[object_slots.len()];
    assert_eq!(ctx.method_name(speak_decl), "Speak");
    assert_eq!(ctx.method_owner(speak_decl), animal);

    // Dispatch resolves to Dog's override.
    let target = ctx.resolve_virtual_slot(speak_decl, dog).unwrap().unwrap();
    assert_eq!(ctx.method_owner(target), dog);

    // On Animal itself, the declaration is its own implementation.
    let target = ctx.resolve_virtual_slot(speak_decl, animal).unwrap().unwrap();
    assert_eq!(ctx.method_owner(target), animal);
}

#[test]
fn test_interface_resolution() {
    let (ctx, module) = load();
    let ifoo = ctx.get_type(module, "App", "IFoo").unwrap();
    let s = ctx.get_type(module, "App", "S").unwrap();

    let iface_m = ctx.methods_of(ifoo)[0];
    let target = ctx.resolve_interface_method(iface_m, s).unwrap().unwrap();
    assert_eq!(ctx.method_owner(target), s);
    assert_eq!(ctx.method_name(target), "M");
}

#[test]
fn test_variant_interface_resolution() {
    let (ctx, module) = load();
    let iro = ctx.get_type(module, "App", "IRo`1").unwrap();
    let animal = ctx.get_type(module, "App", "Animal").unwrap();
    let source = ctx.get_type(module, "App", "DogSource").unwrap();

    // DogSource implements IRo<Dog>; a request through IRo<Animal> matches
    // via covariance.
    let iro_animal = ctx.instantiated_type(iro, smallvec![animal]);
    let get = ctx.methods_of(iro_animal)[0];
    assert!(ctx.resolve_interface_method(get, source).unwrap().is_none());
    let target = ctx
        .resolve_interface_method_variant(get, source)
        .unwrap()
        .unwrap();
    assert_eq!(ctx.method_owner(target), source);
}

#[test]
fn test_rva_field_reads() {
    let (ctx, module) = load();
    let blobs = ctx.get_type(module, "App", "Blobs").unwrap();
    let m = ctx.module(module);
    let def = m.find_type("App", "Blobs").unwrap();
    let fields = &m.type_def(def).fields;

    let eight = ctx.ecma_field(module, fields[0]);
    assert_eq!(ctx.field_owner(eight), blobs);
    assert_eq!(
        ctx.field_rva_data(eight).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );

    // Only 4 bytes remain in the section at 0x2004; an 8-byte element
    // overruns the block.
    let overrun = ctx.ecma_field(module, fields[1]);
    let err = ctx.field_rva_data(overrun).unwrap_err();
    assert!(matches!(err, TypeSystemError::BadImageFormat { .. }));
}

#[test]
fn test_gc_pointer_flags() {
    let (ctx, module) = load();
    let point = ctx.get_type(module, "App", "Point").unwrap();
    let dog = ctx.get_type(module, "App", "Dog").unwrap();
    assert!(!ctx.contains_gc_pointers(point));
    assert!(ctx.contains_gc_pointers(dog));
    assert!(!ctx.type_flags(point).is_reference_type());
    assert!(ctx.type_flags(dog).is_reference_type());
}

#[test]
fn test_canonical_method_target() {
    let (ctx, module) = load();
    let r#gen = ctx.get_type(module, "App", "Gen`1").unwrap();
    let string = ctx.well_known().string;
    let canon = ctx.well_known().canon;

    let inst = ctx.instantiated_type(r#gen, smallvec![string]);
    let get = ctx.methods_of(inst)[0];
    assert!(ctx.shares_generic_code(get));

    let target = ctx.canonical_method_target(get, CanonKind::Specific);
    let canon_owner = ctx.instantiated_type(r#gen, smallvec![canon]);
    assert_eq!(ctx.method_owner(target), canon_owner);
    assert!(ctx.is_canonical_method(target));
    // The canonical target is its own canonical target.
    assert_eq!(
        ctx.canonical_method_target(target, CanonKind::Specific),
        target
    );
}
