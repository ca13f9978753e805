// module.rs
//
// The bound metadata model. `ModuleData` is the serde description produced
// by the external metadata parser; `EcmaModule` is the bound form with
// id-indexed tables. Method bodies arrive already decoded into the
// dependency-bearing instruction summary (`Instr`) -- that is the only view
// of bytecode this system consumes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use ingot_identity::{FieldDefId, FieldId, MethodDefId, MethodId, ModuleId, TypeDefId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::{
    CanonKind, GenericParamOwner, MethodFlags, MethodSignature, PrimitiveKind, TypeDesc,
    TypeIdVec, Variance,
};
use crate::error::{TypeSystemError, TypeSystemResult};

// ============================================================================
// Serde description (external parser output)
// ============================================================================

/// A type reference in metadata, resolved against the type-system context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    /// A well-known primitive.
    Prim(PrimitiveKind),
    /// A named type. Without a `module` the defining module is searched
    /// first, then every loaded module.
    Named {
        #[serde(default)]
        module: Option<String>,
        #[serde(default)]
        namespace: String,
        name: String,
    },
    /// A generic definition applied to arguments.
    Inst {
        def: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    Array {
        element: Box<TypeExpr>,
        #[serde(default)]
        rank: Option<u8>,
    },
    ByRef(Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
    /// `!n`: generic parameter of the enclosing type.
    TypeVar(u32),
    /// `!!n`: generic parameter of the enclosing method.
    MethodVar(u32),
}

/// A method reference: owner, name, and optional method instantiation.
/// Overloads are disambiguated by generic arity and parameter count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodExpr {
    pub owner: TypeExpr,
    pub name: String,
    #[serde(default)]
    pub inst: Vec<TypeExpr>,
}

/// A field reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExpr {
    pub owner: TypeExpr,
    pub name: String,
}

/// Decoded dependency-bearing instruction summary of a method body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instr {
    Call(MethodExpr),
    Callvirt(MethodExpr),
    Newobj(MethodExpr),
    Ldftn(MethodExpr),
    Ldvirtftn(MethodExpr),
    Newarr(TypeExpr),
    Box(TypeExpr),
    UnboxAny(TypeExpr),
    Castclass(TypeExpr),
    Isinst(TypeExpr),
    Ldstr(String),
    LdtokenType(TypeExpr),
    LdtokenMethod(MethodExpr),
    LdtokenField(FieldExpr),
    Ldsfld(FieldExpr),
    Stsfld(FieldExpr),
    Ldfld(FieldExpr),
    Stfld(FieldExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDefKind {
    Class,
    ValueType,
    Interface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericParamData {
    pub name: String,
    #[serde(default)]
    pub variance: Variance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureData {
    #[serde(default)]
    pub params: Vec<TypeExpr>,
    pub ret: TypeExpr,
    #[serde(default)]
    pub vararg: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodData {
    pub name: String,
    pub signature: SignatureData,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_newslot: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_internal_call: bool,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Instr>,
}

impl Default for MethodData {
    fn default() -> Self {
        Self {
            name: String::new(),
            signature: SignatureData {
                params: Vec::new(),
                ret: TypeExpr::Prim(PrimitiveKind::Void),
                vararg: false,
            },
            is_static: false,
            is_virtual: false,
            is_newslot: false,
            is_abstract: false,
            is_final: false,
            is_internal_call: false,
            generic_params: Vec::new(),
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldData {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(default)]
    pub is_static: bool,
    /// Relative virtual address of preinitialized data, for RVA fields.
    #[serde(default)]
    pub rva: Option<u32>,
}

/// An explicit interface implementation record: the interface method this
/// type overrides, and the name of the declared method that implements it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodImplData {
    pub decl: MethodExpr,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeData {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub kind: TypeDefKind,
    #[serde(default)]
    pub base: Option<TypeExpr>,
    #[serde(default)]
    pub interfaces: Vec<TypeExpr>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_sealed: bool,
    /// Attribute-driven reflection block.
    #[serde(default)]
    pub reflection_blocked: bool,
    #[serde(default)]
    pub generic_params: Vec<GenericParamData>,
    #[serde(default)]
    pub fields: Vec<FieldData>,
    #[serde(default)]
    pub methods: Vec<MethodData>,
    #[serde(default)]
    pub method_impls: Vec<MethodImplData>,
    /// Well-known primitive category; only meaningful in the system module.
    #[serde(default)]
    pub primitive: Option<PrimitiveKind>,
    /// Canonical sentinel marker; only meaningful in the system module.
    #[serde(default)]
    pub sentinel: Option<CanonKind>,
}

impl Default for TypeData {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            name: String::new(),
            kind: TypeDefKind::Class,
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_sealed: false,
            reflection_blocked: false,
            generic_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            method_impls: Vec::new(),
            primitive: None,
            sentinel: None,
        }
    }
}

/// A data section carrying RVA field contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionData {
    pub rva: u32,
    pub data: Vec<u8>,
}

/// One module as described by the external metadata parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleData {
    pub name: String,
    #[serde(default)]
    pub entry_point: Option<MethodExpr>,
    #[serde(default)]
    pub types: Vec<TypeData>,
    #[serde(default)]
    pub sections: Vec<SectionData>,
}

// ============================================================================
// Bound module
// ============================================================================

#[derive(Debug)]
pub struct EcmaTypeDef {
    pub namespace: String,
    pub name: String,
    pub kind: TypeDefKind,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub reflection_blocked: bool,
    pub base: Option<TypeExpr>,
    pub interfaces: Vec<TypeExpr>,
    pub generic_params: Vec<GenericParamData>,
    pub methods: Vec<MethodDefId>,
    pub fields: Vec<FieldDefId>,
    pub method_impls: Vec<MethodImplData>,
    pub primitive: Option<PrimitiveKind>,
    pub sentinel: Option<CanonKind>,
}

#[derive(Debug)]
pub struct EcmaMethodDef {
    pub name: String,
    pub owner: TypeDefId,
    pub flags: MethodFlags,
    pub signature: SignatureData,
    pub body: Vec<Instr>,
}

#[derive(Debug)]
pub struct EcmaFieldDef {
    pub name: String,
    pub owner: TypeDefId,
    pub ty: TypeExpr,
    pub is_static: bool,
    pub rva: Option<u32>,
}

/// A bound module: id-indexed metadata tables plus a name lookup. Read-only
/// after binding.
#[derive(Debug)]
pub struct EcmaModule {
    pub id: ModuleId,
    pub name: String,
    pub entry_point: Option<MethodExpr>,
    types: Vec<EcmaTypeDef>,
    methods: Vec<EcmaMethodDef>,
    fields: Vec<EcmaFieldDef>,
    type_lookup: FxHashMap<(String, String), TypeDefId>,
    sections: Vec<SectionData>,
}

impl EcmaModule {
    pub fn bind(id: ModuleId, data: ModuleData) -> TypeSystemResult<Self> {
        let mut types = Vec::with_capacity(data.types.len());
        let mut methods = Vec::new();
        let mut fields = Vec::new();
        let mut type_lookup = FxHashMap::default();

        for type_data in data.types {
            let type_def_id = TypeDefId::new(types.len() as u32);
            let key = (type_data.namespace.clone(), type_data.name.clone());
            if type_lookup.insert(key, type_def_id).is_some() {
                return Err(TypeSystemError::bad_image(format!(
                    "duplicate type '{}.{}' in module '{}'",
                    type_data.namespace, type_data.name, data.name
                )));
            }

            let mut method_ids = Vec::with_capacity(type_data.methods.len());
            for method in type_data.methods {
                let def_id = MethodDefId::new(methods.len() as u32);
                methods.push(EcmaMethodDef {
                    flags: MethodFlags {
                        is_static: method.is_static,
                        is_virtual: method.is_virtual,
                        is_newslot: method.is_newslot,
                        is_abstract: method.is_abstract,
                        is_final: method.is_final,
                        is_internal_call: method.is_internal_call,
                        generic_arity: method.generic_params.len() as u32,
                    },
                    name: method.name,
                    owner: type_def_id,
                    signature: method.signature,
                    body: method.body,
                });
                method_ids.push(def_id);
            }

            let mut field_ids = Vec::with_capacity(type_data.fields.len());
            for field in type_data.fields {
                let def_id = FieldDefId::new(fields.len() as u32);
                fields.push(EcmaFieldDef {
                    name: field.name,
                    owner: type_def_id,
                    ty: field.ty,
                    is_static: field.is_static,
                    rva: field.rva,
                });
                field_ids.push(def_id);
            }

            types.push(EcmaTypeDef {
                namespace: type_data.namespace,
                name: type_data.name,
                kind: type_data.kind,
                is_abstract: type_data.is_abstract,
                is_sealed: type_data.is_sealed,
                reflection_blocked: type_data.reflection_blocked,
                base: type_data.base,
                interfaces: type_data.interfaces,
                generic_params: type_data.generic_params,
                methods: method_ids,
                fields: field_ids,
                method_impls: type_data.method_impls,
                primitive: type_data.primitive,
                sentinel: type_data.sentinel,
            });
        }

        Ok(Self {
            id,
            name: data.name,
            entry_point: data.entry_point,
            types,
            methods,
            fields,
            type_lookup,
            sections: data.sections,
        })
    }

    pub fn type_def(&self, id: TypeDefId) -> &EcmaTypeDef {
        &self.types[id.index() as usize]
    }

    pub fn method_def(&self, id: MethodDefId) -> &EcmaMethodDef {
        &self.methods[id.index() as usize]
    }

    pub fn field_def(&self, id: FieldDefId) -> &EcmaFieldDef {
        &self.fields[id.index() as usize]
    }

    pub fn find_type(&self, namespace: &str, name: &str) -> Option<TypeDefId> {
        self.type_lookup
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn type_defs(&self) -> impl Iterator<Item = (TypeDefId, &EcmaTypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, td)| (TypeDefId::new(i as u32), td))
    }

    /// Read `size` bytes of section data at an RVA. The read must fit
    /// inside the section block (S6).
    pub fn rva_data(&self, rva: u32, size: usize) -> TypeSystemResult<&[u8]> {
        for section in &self.sections {
            if rva >= section.rva && (rva as u64) < section.rva as u64 + section.data.len() as u64 {
                let offset = (rva - section.rva) as usize;
                if offset + size > section.data.len() {
                    return Err(TypeSystemError::bad_image(format!(
                        "RVA {:#x} data of size {} overruns section block of length {}",
                        rva,
                        size,
                        section.data.len()
                    )));
                }
                return Ok(&section.data[offset..offset + size]);
            }
        }
        Err(TypeSystemError::bad_image(format!(
            "RVA {:#x} not mapped to any section",
            rva
        )))
    }
}

// ============================================================================
// Reference resolution
// ============================================================================

impl TypeSystemContext {
    /// Resolve a type reference. `type_args`/`method_args` substitute the
    /// signature variables; with empty argument lists variables resolve to
    /// open generic parameters.
    pub fn resolve_type_expr(
        &self,
        expr: &TypeExpr,
        scope: ModuleId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> TypeSystemResult<TypeId> {
        match expr {
            TypeExpr::Prim(kind) => Ok(self.well_known().primitive(*kind)),
            TypeExpr::Named {
                module,
                namespace,
                name,
            } => {
                let module_id = match module {
                    Some(module_name) => self.find_module(module_name).ok_or_else(|| {
                        TypeSystemError::type_load(namespace.clone(), name.clone())
                    })?,
                    None => self
                        .search_type(scope, namespace, name)
                        .ok_or_else(|| TypeSystemError::type_load(namespace.clone(), name.clone()))?,
                };
                self.get_type(module_id, namespace, name)
            }
            TypeExpr::Inst { def, args } => {
                let def_ty = self.resolve_type_expr(def, scope, &[], &[])?;
                let TypeDesc::Def { module, def: def_id } = self.type_desc(def_ty) else {
                    return Err(TypeSystemError::bad_image(
                        "generic instantiation of a non-definition type",
                    ));
                };
                let arity = self.module(module).type_def(def_id).generic_params.len();
                if arity != args.len() {
                    return Err(TypeSystemError::bad_image(format!(
                        "instantiation arity mismatch: expected {}, got {}",
                        arity,
                        args.len()
                    )));
                }
                let mut resolved = TypeIdVec::new();
                for arg in args {
                    resolved.push(self.resolve_type_expr(arg, scope, type_args, method_args)?);
                }
                Ok(self.instantiated_type(def_ty, resolved))
            }
            TypeExpr::Array { element, rank } => {
                let element = self.resolve_type_expr(element, scope, type_args, method_args)?;
                Ok(match rank {
                    None => self.array_type(element),
                    Some(rank) => self.mdarray_type(element, *rank),
                })
            }
            TypeExpr::ByRef(element) => {
                let element = self.resolve_type_expr(element, scope, type_args, method_args)?;
                Ok(self.byref_type(element))
            }
            TypeExpr::Pointer(element) => {
                let element = self.resolve_type_expr(element, scope, type_args, method_args)?;
                Ok(self.pointer_type(element))
            }
            TypeExpr::TypeVar(index) => {
                if type_args.is_empty() {
                    Ok(self.generic_param(GenericParamOwner::Type, *index))
                } else {
                    type_args.get(*index as usize).copied().ok_or_else(|| {
                        TypeSystemError::bad_image(format!("type variable !{} out of range", index))
                    })
                }
            }
            TypeExpr::MethodVar(index) => {
                if method_args.is_empty() {
                    Ok(self.generic_param(GenericParamOwner::Method, *index))
                } else {
                    method_args.get(*index as usize).copied().ok_or_else(|| {
                        TypeSystemError::bad_image(format!(
                            "method variable !!{} out of range",
                            index
                        ))
                    })
                }
            }
        }
    }

    fn search_type(&self, scope: ModuleId, namespace: &str, name: &str) -> Option<ModuleId> {
        if self.module(scope).find_type(namespace, name).is_some() {
            return Some(scope);
        }
        for index in 0..self.module_count() {
            let id = ModuleId::new(index as u32);
            if id != scope && self.module(id).find_type(namespace, name).is_some() {
                return Some(id);
            }
        }
        None
    }

    /// Resolve a method reference: the owner is resolved first, then the
    /// named method is looked up on its definition (walking the base chain
    /// for inherited references), then the method instantiation is applied.
    pub fn resolve_method_expr(
        &self,
        expr: &MethodExpr,
        scope: ModuleId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> TypeSystemResult<MethodId> {
        let owner = self.resolve_type_expr(&expr.owner, scope, type_args, method_args)?;
        let mut inst = TypeIdVec::new();
        for arg in &expr.inst {
            inst.push(self.resolve_type_expr(arg, scope, type_args, method_args)?);
        }

        let mut search: Option<TypeId> = Some(owner);
        while let Some(current) = search {
            let def_ty = self.type_definition(current);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let m = self.module(module);
                for &mdef in &m.type_def(def).methods {
                    let method = m.method_def(mdef);
                    if method.name == expr.name
                        && method.flags.generic_arity as usize == expr.inst.len()
                    {
                        let ecma = self.ecma_method(module, mdef);
                        let on_owner = self.method_on_type(ecma, current);
                        return Ok(self.instantiated_method(on_owner, inst));
                    }
                }
            }
            search = self.base_type(current)?;
        }

        Err(TypeSystemError::missing_method(
            self.type_name(owner),
            expr.name.clone(),
        ))
    }

    /// Resolve a field reference.
    pub fn resolve_field_expr(
        &self,
        expr: &FieldExpr,
        scope: ModuleId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> TypeSystemResult<FieldId> {
        let owner = self.resolve_type_expr(&expr.owner, scope, type_args, method_args)?;
        let mut search: Option<TypeId> = Some(owner);
        while let Some(current) = search {
            let def_ty = self.type_definition(current);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let m = self.module(module);
                for &fdef in &m.type_def(def).fields {
                    if m.field_def(fdef).name == expr.name {
                        let ecma = self.ecma_field(module, fdef);
                        return Ok(self.field_on_type(ecma, current));
                    }
                }
            }
            search = self.base_type(current)?;
        }
        Err(TypeSystemError::missing_field(
            self.type_name(owner),
            expr.name.clone(),
        ))
    }

    /// Resolve and intern a method definition's declared signature, open
    /// over its generic parameters. Cached per definition row.
    pub(crate) fn def_signature(
        &self,
        module: ModuleId,
        def: MethodDefId,
    ) -> TypeSystemResult<ingot_identity::SigId> {
        if let Some(&sig) = self.def_sig_cache.borrow().get(&(module, def)) {
            return Ok(sig);
        }
        let m = self.module(module);
        let method = m.method_def(def);
        if method.signature.vararg {
            return Err(TypeSystemError::bad_image(format!(
                "vararg signature on method '{}'",
                method.name
            )));
        }
        let mut params = TypeIdVec::new();
        for param in &method.signature.params {
            params.push(self.resolve_type_expr(param, module, &[], &[])?);
        }
        let ret = self.resolve_type_expr(&method.signature.ret, module, &[], &[])?;
        let sig = self.intern_signature(MethodSignature {
            params,
            ret,
            is_static: method.flags.is_static,
            is_vararg: false,
        });
        self.def_sig_cache.borrow_mut().insert((module, def), sig);
        Ok(sig)
    }

    /// The contents of a static RVA field: exactly element-size bytes of
    /// section data. Fields without an RVA, or with a non-blittable type,
    /// are rejected.
    pub fn field_rva_data(&self, field: FieldId) -> TypeSystemResult<Vec<u8>> {
        let (module, def) = self.field_ecma(field);
        let m = self.module(module);
        let fdef = m.field_def(def);
        let rva = fdef.rva.ok_or_else(|| {
            TypeSystemError::bad_image(format!("field '{}' has no RVA data", fdef.name))
        })?;
        let owner_args = self.type_instantiation(self.field_owner(field));
        let ty = self.resolve_type_expr(&fdef.ty, module, &owner_args, &[])?;
        let size = self.value_size(ty)?;
        Ok(m.rva_data(rva, size)?.to_vec())
    }

    /// Byte size of a value of the type: the element size used for RVA
    /// reads. Only primitives and value types with blittable layouts have
    /// one.
    pub fn value_size(&self, ty: TypeId) -> TypeSystemResult<usize> {
        let flags = self.type_flags(ty);
        if let Some(kind) = flags.primitive {
            return Ok(kind.element_size());
        }
        if flags.is_value_type {
            let mut total = 0;
            for field_ty in self.instance_field_types(ty)? {
                total += self.value_size(field_ty)?;
            }
            return Ok(total);
        }
        Err(TypeSystemError::bad_image(format!(
            "type '{}' has no flat value layout",
            self.type_name(ty)
        )))
    }
}

// ============================================================================
// Built-in system module
// ============================================================================

fn virtual_method(name: &str, ret: TypeExpr) -> MethodData {
    MethodData {
        name: name.to_string(),
        signature: SignatureData {
            params: Vec::new(),
            ret,
            vararg: false,
        },
        is_virtual: true,
        is_newslot: true,
        ..MethodData::default()
    }
}

fn primitive_type(name: &str, kind: PrimitiveKind) -> TypeData {
    TypeData {
        namespace: "System".to_string(),
        name: name.to_string(),
        kind: TypeDefKind::ValueType,
        is_sealed: true,
        base: Some(TypeExpr::Named {
            module: None,
            namespace: "System".to_string(),
            name: "ValueType".to_string(),
        }),
        primitive: Some(kind),
        ..TypeData::default()
    }
}

/// The synthetic system module: `System.Object` and friends, the primitive
/// value types, and the canonical sentinels. Loaded into every context so
/// small inputs stay self-contained.
pub fn system_module_data() -> ModuleData {
    let object = || TypeExpr::Named {
        module: None,
        namespace: "System".to_string(),
        name: "Object".to_string(),
    };
    let string_ty = || TypeExpr::Named {
        module: None,
        namespace: "System".to_string(),
        name: "String".to_string(),
    };

    let mut types = vec![
        TypeData {
            namespace: "System".to_string(),
            name: "Object".to_string(),
            kind: TypeDefKind::Class,
            methods: vec![
                MethodData {
                    name: ".ctor".to_string(),
                    ..MethodData::default()
                },
                virtual_method("ToString", string_ty()),
                MethodData {
                    name: "Equals".to_string(),
                    signature: SignatureData {
                        params: vec![object()],
                        ret: TypeExpr::Prim(PrimitiveKind::Bool),
                        vararg: false,
                    },
                    is_virtual: true,
                    is_newslot: true,
                    ..MethodData::default()
                },
                virtual_method("GetHashCode", TypeExpr::Prim(PrimitiveKind::I32)),
                virtual_method("Finalize", TypeExpr::Prim(PrimitiveKind::Void)),
            ],
            ..TypeData::default()
        },
        TypeData {
            namespace: "System".to_string(),
            name: "ValueType".to_string(),
            kind: TypeDefKind::Class,
            is_abstract: true,
            base: Some(object()),
            ..TypeData::default()
        },
        TypeData {
            namespace: "System".to_string(),
            name: "String".to_string(),
            kind: TypeDefKind::Class,
            is_sealed: true,
            base: Some(object()),
            methods: vec![MethodData {
                name: "get_Length".to_string(),
                signature: SignatureData {
                    params: Vec::new(),
                    ret: TypeExpr::Prim(PrimitiveKind::I32),
                    vararg: false,
                },
                ..MethodData::default()
            }],
            ..TypeData::default()
        },
        TypeData {
            namespace: "System".to_string(),
            name: "Array".to_string(),
            kind: TypeDefKind::Class,
            is_abstract: true,
            base: Some(object()),
            ..TypeData::default()
        },
        // The shared generic array implementation; its methods are always
        // reflection-blocked.
        TypeData {
            namespace: "System".to_string(),
            name: "Array`1".to_string(),
            kind: TypeDefKind::Class,
            base: Some(TypeExpr::Named {
                module: None,
                namespace: "System".to_string(),
                name: "Array".to_string(),
            }),
            generic_params: vec![GenericParamData {
                name: "T".to_string(),
                variance: Variance::Invariant,
            }],
            methods: vec![
                MethodData {
                    name: "Get".to_string(),
                    signature: SignatureData {
                        params: vec![TypeExpr::Prim(PrimitiveKind::I32)],
                        ret: TypeExpr::TypeVar(0),
                        vararg: false,
                    },
                    ..MethodData::default()
                },
                MethodData {
                    name: "Set".to_string(),
                    signature: SignatureData {
                        params: vec![TypeExpr::Prim(PrimitiveKind::I32), TypeExpr::TypeVar(0)],
                        ret: TypeExpr::Prim(PrimitiveKind::Void),
                        vararg: false,
                    },
                    ..MethodData::default()
                },
            ],
            ..TypeData::default()
        },
        TypeData {
            namespace: "System".to_string(),
            name: "__Canon".to_string(),
            kind: TypeDefKind::Class,
            base: Some(object()),
            sentinel: Some(CanonKind::Specific),
            ..TypeData::default()
        },
        TypeData {
            namespace: "System".to_string(),
            name: "__UniversalCanon".to_string(),
            kind: TypeDefKind::Class,
            base: Some(object()),
            sentinel: Some(CanonKind::Universal),
            ..TypeData::default()
        },
    ];

    types.push(primitive_type("Void", PrimitiveKind::Void));
    types.push(primitive_type("Boolean", PrimitiveKind::Bool));
    types.push(primitive_type("Char", PrimitiveKind::Char));
    types.push(primitive_type("SByte", PrimitiveKind::I8));
    types.push(primitive_type("Byte", PrimitiveKind::U8));
    types.push(primitive_type("Int16", PrimitiveKind::I16));
    types.push(primitive_type("UInt16", PrimitiveKind::U16));
    types.push(primitive_type("Int32", PrimitiveKind::I32));
    types.push(primitive_type("UInt32", PrimitiveKind::U32));
    types.push(primitive_type("Int64", PrimitiveKind::I64));
    types.push(primitive_type("UInt64", PrimitiveKind::U64));
    types.push(primitive_type("Single", PrimitiveKind::F32));
    types.push(primitive_type("Double", PrimitiveKind::F64));
    types.push(primitive_type("IntPtr", PrimitiveKind::IntPtr));
    types.push(primitive_type("UIntPtr", PrimitiveKind::UIntPtr));

    ModuleData {
        name: "System.Private.CoreLib".to_string(),
        entry_point: None,
        types,
        sections: Vec::new(),
    }
}

// Method body access goes through the context so instantiation context and
// the internalcall rule live in one place.
impl TypeSystemContext {
    /// The decoded body of a method definition. Abstract methods have none;
    /// internalcall outside the system module is rejected per ECMA.
    pub fn method_body(&self, m: MethodId) -> TypeSystemResult<Option<Vec<Instr>>> {
        let (module, def) = self.method_ecma(m);
        let ecma_module = self.module(module);
        let method = ecma_module.method_def(def);
        if method.flags.is_abstract {
            return Ok(None);
        }
        if method.flags.is_internal_call {
            if module != self.system_module() {
                return Err(TypeSystemError::invalid_program(format!(
                    "internalcall method '{}' outside the system module",
                    method.name
                )));
            }
            return Ok(None);
        }
        Ok(Some(method.body.clone()))
    }
}
