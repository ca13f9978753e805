// context.rs
//
// TypeSystemContext: per-compilation entity storage with structural
// interning. Handles returned from here are identity: equal inputs intern to
// the same id (the interning invariant everything else builds on).
//
// Intern tables live behind RefCells so that interning works through a
// shared reference. Dependency computation creates entities while the graph
// is iterating its marked list; the tables are append-only and
// single-threaded, so the only discipline required is "never hold a borrow
// across a call that may intern".

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use ingot_identity::{FieldDefId, FieldId, MethodDefId, MethodId, ModuleId, SigId, StringId, TypeDefId, TypeId};

use crate::desc::{
    CanonKind, FieldDesc, GenericParamOwner, MethodDesc, MethodFlags, MethodSignature,
    PrimitiveKind, StubKind, TypeDesc, TypeFlags, TypeIdVec,
};
use crate::error::{TypeSystemError, TypeSystemResult};
use crate::module::{system_module_data, EcmaModule, ModuleData, TypeDefKind};

/// Pre-resolved handles for the well-known system types.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownTypes {
    pub object: TypeId,
    pub value_type: TypeId,
    pub string: TypeId,
    pub array: TypeId,
    pub canon: TypeId,
    pub universal_canon: TypeId,
    pub void: TypeId,
    pub bool_: TypeId,
    pub char_: TypeId,
    pub i8: TypeId,
    pub u8: TypeId,
    pub i16: TypeId,
    pub u16: TypeId,
    pub i32: TypeId,
    pub u32: TypeId,
    pub i64: TypeId,
    pub u64: TypeId,
    pub f32: TypeId,
    pub f64: TypeId,
    pub intptr: TypeId,
    pub uintptr: TypeId,
}

impl WellKnownTypes {
    /// Initialize all fields to a placeholder value; filled in during
    /// context bootstrap.
    fn placeholder() -> Self {
        let invalid = TypeId::new(u32::MAX);
        Self {
            object: invalid,
            value_type: invalid,
            string: invalid,
            array: invalid,
            canon: invalid,
            universal_canon: invalid,
            void: invalid,
            bool_: invalid,
            char_: invalid,
            i8: invalid,
            u8: invalid,
            i16: invalid,
            u16: invalid,
            i32: invalid,
            u32: invalid,
            i64: invalid,
            u64: invalid,
            f32: invalid,
            f64: invalid,
            intptr: invalid,
            uintptr: invalid,
        }
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        match kind {
            PrimitiveKind::Void => self.void,
            PrimitiveKind::Bool => self.bool_,
            PrimitiveKind::Char => self.char_,
            PrimitiveKind::I8 => self.i8,
            PrimitiveKind::U8 => self.u8,
            PrimitiveKind::I16 => self.i16,
            PrimitiveKind::U16 => self.u16,
            PrimitiveKind::I32 => self.i32,
            PrimitiveKind::U32 => self.u32,
            PrimitiveKind::I64 => self.i64,
            PrimitiveKind::U64 => self.u64,
            PrimitiveKind::F32 => self.f32,
            PrimitiveKind::F64 => self.f64,
            PrimitiveKind::IntPtr => self.intptr,
            PrimitiveKind::UIntPtr => self.uintptr,
        }
    }
}

/// Per-compilation type system: loaded modules plus interned entities and
/// the lazy caches the algebra builds over them.
pub struct TypeSystemContext {
    types: RefCell<Vec<TypeDesc>>,
    type_flags: RefCell<Vec<TypeFlags>>,
    type_intern: RefCell<FxHashMap<TypeDesc, TypeId>>,
    methods: RefCell<Vec<MethodDesc>>,
    method_intern: RefCell<FxHashMap<MethodDesc, MethodId>>,
    fields: RefCell<Vec<FieldDesc>>,
    field_intern: RefCell<FxHashMap<FieldDesc, FieldId>>,
    sigs: RefCell<Vec<MethodSignature>>,
    sig_intern: RefCell<FxHashMap<MethodSignature, SigId>>,
    strings: RefCell<Vec<String>>,
    string_intern: RefCell<FxHashMap<String, StringId>>,
    modules: RefCell<Vec<Rc<EcmaModule>>>,
    module_lookup: RefCell<FxHashMap<String, ModuleId>>,

    // Lazy caches. All keyed by interned handles, so entries never go stale.
    pub(crate) def_sig_cache: RefCell<FxHashMap<(ModuleId, MethodDefId), SigId>>,
    pub(crate) base_cache: RefCell<FxHashMap<TypeId, Option<TypeId>>>,
    pub(crate) iface_cache: RefCell<FxHashMap<TypeId, Rc<[TypeId]>>>,
    pub(crate) introduced_cache: RefCell<FxHashMap<TypeId, Rc<[MethodDefId]>>>,
    pub(crate) slot_cache: RefCell<FxHashMap<TypeId, Rc<[MethodId]>>>,
    pub(crate) impl_cache: RefCell<FxHashMap<TypeId, Rc<[MethodId]>>>,
    gc_cache: RefCell<FxHashMap<TypeId, bool>>,

    well_known: WellKnownTypes,
    system_module: ModuleId,
    generated_module: ModuleId,
}

impl TypeSystemContext {
    /// Create a context with the synthetic system module (well-known types,
    /// primitives, canon sentinels) and the generated-stubs module loaded.
    pub fn new() -> Self {
        let mut ctx = Self {
            types: RefCell::new(Vec::new()),
            type_flags: RefCell::new(Vec::new()),
            type_intern: RefCell::new(FxHashMap::default()),
            methods: RefCell::new(Vec::new()),
            method_intern: RefCell::new(FxHashMap::default()),
            fields: RefCell::new(Vec::new()),
            field_intern: RefCell::new(FxHashMap::default()),
            sigs: RefCell::new(Vec::new()),
            sig_intern: RefCell::new(FxHashMap::default()),
            strings: RefCell::new(Vec::new()),
            string_intern: RefCell::new(FxHashMap::default()),
            modules: RefCell::new(Vec::new()),
            module_lookup: RefCell::new(FxHashMap::default()),
            def_sig_cache: RefCell::new(FxHashMap::default()),
            base_cache: RefCell::new(FxHashMap::default()),
            iface_cache: RefCell::new(FxHashMap::default()),
            introduced_cache: RefCell::new(FxHashMap::default()),
            slot_cache: RefCell::new(FxHashMap::default()),
            impl_cache: RefCell::new(FxHashMap::default()),
            gc_cache: RefCell::new(FxHashMap::default()),
            well_known: WellKnownTypes::placeholder(),
            system_module: ModuleId::new(0),
            generated_module: ModuleId::new(1),
        };

        let system = ctx
            .load_module(system_module_data())
            .expect("system module is well-formed");
        let generated = ctx
            .load_module(ModuleData {
                name: "<generated>".to_string(),
                ..ModuleData::default()
            })
            .expect("generated module is well-formed");
        ctx.system_module = system;
        ctx.generated_module = generated;

        let wk = |ns: &str, name: &str| {
            ctx.get_type(system, ns, name)
                .expect("well-known type present in system module")
        };
        ctx.well_known = WellKnownTypes {
            object: wk("System", "Object"),
            value_type: wk("System", "ValueType"),
            string: wk("System", "String"),
            array: wk("System", "Array"),
            canon: wk("System", "__Canon"),
            universal_canon: wk("System", "__UniversalCanon"),
            void: wk("System", "Void"),
            bool_: wk("System", "Boolean"),
            char_: wk("System", "Char"),
            i8: wk("System", "SByte"),
            u8: wk("System", "Byte"),
            i16: wk("System", "Int16"),
            u16: wk("System", "UInt16"),
            i32: wk("System", "Int32"),
            u32: wk("System", "UInt32"),
            i64: wk("System", "Int64"),
            u64: wk("System", "UInt64"),
            f32: wk("System", "Single"),
            f64: wk("System", "Double"),
            intptr: wk("System", "IntPtr"),
            uintptr: wk("System", "UIntPtr"),
        };
        ctx
    }

    pub fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    pub fn system_module(&self) -> ModuleId {
        self.system_module
    }

    pub fn generated_module(&self) -> ModuleId {
        self.generated_module
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Bind a module description and register it. Module names are unique
    /// per context.
    pub fn load_module(&self, data: ModuleData) -> TypeSystemResult<ModuleId> {
        if self.module_lookup.borrow().contains_key(&data.name) {
            return Err(TypeSystemError::bad_image(format!(
                "duplicate module '{}'",
                data.name
            )));
        }
        let id = ModuleId::new(self.modules.borrow().len() as u32);
        let module = EcmaModule::bind(id, data)?;
        self.module_lookup
            .borrow_mut()
            .insert(module.name.clone(), id);
        self.modules.borrow_mut().push(Rc::new(module));
        Ok(id)
    }

    pub fn module(&self, id: ModuleId) -> Rc<EcmaModule> {
        self.modules.borrow()[id.index() as usize].clone()
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.module_lookup.borrow().get(name).copied()
    }

    pub fn module_count(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Look up a type definition by name and intern its definition type.
    pub fn get_type(
        &self,
        module: ModuleId,
        namespace: &str,
        name: &str,
    ) -> TypeSystemResult<TypeId> {
        let m = self.module(module);
        let def = m
            .find_type(namespace, name)
            .ok_or_else(|| TypeSystemError::type_load(namespace, name))?;
        Ok(self.def_type(module, def))
    }

    // ========================================================================
    // Type interning
    // ========================================================================

    pub(crate) fn intern_type(&self, desc: TypeDesc) -> TypeId {
        if let Some(&id) = self.type_intern.borrow().get(&desc) {
            return id;
        }
        // Flags are computed before taking the arena borrows; the
        // computation only reads already-interned components.
        let flags = self.compute_type_flags(&desc);
        let mut types = self.types.borrow_mut();
        let id = TypeId::new(types.len() as u32);
        types.push(desc.clone());
        self.type_flags.borrow_mut().push(flags);
        self.type_intern.borrow_mut().insert(desc, id);
        id
    }

    pub fn def_type(&self, module: ModuleId, def: TypeDefId) -> TypeId {
        self.intern_type(TypeDesc::Def { module, def })
    }

    /// `MakeInstantiatedType`: a generic definition applied to arguments.
    pub fn instantiated_type(&self, def: TypeId, args: TypeIdVec) -> TypeId {
        debug_assert!(matches!(self.type_desc(def), TypeDesc::Def { .. }));
        debug_assert!(!args.is_empty());
        self.intern_type(TypeDesc::Instantiated { def, args })
    }

    pub fn array_type(&self, element: TypeId) -> TypeId {
        self.intern_type(TypeDesc::Array {
            element,
            rank: None,
        })
    }

    pub fn mdarray_type(&self, element: TypeId, rank: u8) -> TypeId {
        self.intern_type(TypeDesc::Array {
            element,
            rank: Some(rank),
        })
    }

    pub fn byref_type(&self, element: TypeId) -> TypeId {
        self.intern_type(TypeDesc::ByRef(element))
    }

    pub fn pointer_type(&self, element: TypeId) -> TypeId {
        self.intern_type(TypeDesc::Pointer(element))
    }

    pub fn function_pointer_type(&self, sig: SigId) -> TypeId {
        self.intern_type(TypeDesc::FunctionPointer(sig))
    }

    pub fn generic_param(&self, owner: GenericParamOwner, index: u32) -> TypeId {
        self.intern_type(TypeDesc::GenericParam { owner, index })
    }

    pub fn type_desc(&self, ty: TypeId) -> TypeDesc {
        self.types.borrow()[ty.index() as usize].clone()
    }

    pub fn type_flags(&self, ty: TypeId) -> TypeFlags {
        self.type_flags.borrow()[ty.index() as usize]
    }

    /// The definition a type instantiates, or the type itself when it is
    /// already a definition.
    pub fn type_definition(&self, ty: TypeId) -> TypeId {
        match self.type_desc(ty) {
            TypeDesc::Instantiated { def, .. } => def,
            _ => ty,
        }
    }

    /// Instantiation arguments, empty for uninstantiated types.
    pub fn type_instantiation(&self, ty: TypeId) -> TypeIdVec {
        match self.type_desc(ty) {
            TypeDesc::Instantiated { args, .. } => args,
            _ => TypeIdVec::new(),
        }
    }

    /// The module that defines a type, for module-group membership checks.
    /// Parameterized shapes belong to the module of their element.
    pub fn defining_module(&self, ty: TypeId) -> ModuleId {
        match self.type_desc(ty) {
            TypeDesc::Def { module, .. } => module,
            TypeDesc::Instantiated { def, .. } => self.defining_module(def),
            TypeDesc::Array { element, .. }
            | TypeDesc::ByRef(element)
            | TypeDesc::Pointer(element) => self.defining_module(element),
            TypeDesc::FunctionPointer(_) | TypeDesc::GenericParam { .. } => self.system_module,
        }
    }

    fn compute_type_flags(&self, desc: &TypeDesc) -> TypeFlags {
        fn fold_canon(a: Option<CanonKind>, b: Option<CanonKind>) -> Option<CanonKind> {
            match (a, b) {
                (Some(CanonKind::Universal), _) | (_, Some(CanonKind::Universal)) => {
                    Some(CanonKind::Universal)
                }
                (Some(CanonKind::Specific), _) | (_, Some(CanonKind::Specific)) => {
                    Some(CanonKind::Specific)
                }
                _ => None,
            }
        }

        match desc {
            TypeDesc::Def { module, def } => {
                let m = self.module(*module);
                let td = m.type_def(*def);
                TypeFlags {
                    primitive: td.primitive,
                    is_value_type: td.kind == TypeDefKind::ValueType,
                    is_interface: td.kind == TypeDefKind::Interface,
                    contains_generic_vars: false,
                    canon_level: td.sentinel,
                }
            }
            TypeDesc::Instantiated { def, args } => {
                let base = self.type_flags(*def);
                let mut contains_generic_vars = false;
                let mut canon_level = None;
                for &arg in args {
                    let f = self.type_flags(arg);
                    contains_generic_vars |= f.contains_generic_vars;
                    canon_level = fold_canon(canon_level, f.canon_level);
                }
                TypeFlags {
                    primitive: None,
                    is_value_type: base.is_value_type,
                    is_interface: base.is_interface,
                    contains_generic_vars,
                    canon_level,
                }
            }
            TypeDesc::Array { element, .. } => {
                let f = self.type_flags(*element);
                TypeFlags {
                    primitive: None,
                    is_value_type: false,
                    is_interface: false,
                    contains_generic_vars: f.contains_generic_vars,
                    canon_level: f.canon_level,
                }
            }
            TypeDesc::ByRef(element) | TypeDesc::Pointer(element) => {
                let f = self.type_flags(*element);
                TypeFlags {
                    primitive: None,
                    is_value_type: true,
                    is_interface: false,
                    contains_generic_vars: f.contains_generic_vars,
                    canon_level: f.canon_level,
                }
            }
            TypeDesc::FunctionPointer(sig) => {
                let sig = self.signature(*sig);
                let mut contains_generic_vars = false;
                let mut canon_level = None;
                for &ty in sig.params.iter().chain(std::iter::once(&sig.ret)) {
                    let f = self.type_flags(ty);
                    contains_generic_vars |= f.contains_generic_vars;
                    canon_level = fold_canon(canon_level, f.canon_level);
                }
                TypeFlags {
                    primitive: None,
                    is_value_type: true,
                    is_interface: false,
                    contains_generic_vars,
                    canon_level,
                }
            }
            TypeDesc::GenericParam { .. } => TypeFlags {
                primitive: None,
                is_value_type: false,
                is_interface: false,
                contains_generic_vars: true,
                canon_level: None,
            },
        }
    }

    /// Whether instances of the type embed GC references. Reference types
    /// count as a GC pointer themselves; value types ask their instance
    /// field layout. Resolution failures read as "no", the failure itself
    /// surfaces wherever the type is actually loaded.
    pub fn contains_gc_pointers(&self, ty: TypeId) -> bool {
        if let Some(&cached) = self.gc_cache.borrow().get(&ty) {
            return cached;
        }
        // Seed with false so malformed cyclic layouts terminate.
        self.gc_cache.borrow_mut().insert(ty, false);
        let flags = self.type_flags(ty);
        let result = if flags.is_reference_type() {
            true
        } else if flags.primitive.is_some() {
            false
        } else if flags.is_value_type {
            self.instance_field_types(ty)
                .map(|fields| fields.iter().any(|&f| self.contains_gc_pointers(f)))
                .unwrap_or(false)
        } else {
            false
        };
        self.gc_cache.borrow_mut().insert(ty, result);
        result
    }

    // ========================================================================
    // Method interning
    // ========================================================================

    pub(crate) fn intern_method(&self, desc: MethodDesc) -> MethodId {
        if let Some(&id) = self.method_intern.borrow().get(&desc) {
            return id;
        }
        let mut methods = self.methods.borrow_mut();
        let id = MethodId::new(methods.len() as u32);
        methods.push(desc.clone());
        self.method_intern.borrow_mut().insert(desc, id);
        id
    }

    /// The method definition handle: a metadata row on its uninstantiated
    /// owner type.
    pub fn ecma_method(&self, module: ModuleId, def: MethodDefId) -> MethodId {
        let owner_def = self.module(module).method_def(def).owner;
        let owner = self.def_type(module, owner_def);
        self.intern_method(MethodDesc::Ecma { module, def, owner })
    }

    /// A method definition viewed on an instantiated owner. Normalized: an
    /// uninstantiated owner yields the definition handle itself.
    pub fn method_on_type(&self, def: MethodId, owner: TypeId) -> MethodId {
        debug_assert!(matches!(self.method_desc(def), MethodDesc::Ecma { .. }));
        if !matches!(self.type_desc(owner), TypeDesc::Instantiated { .. }) {
            return def;
        }
        self.intern_method(MethodDesc::OnType { def, owner })
    }

    /// `MakeInstantiatedMethod`: a generic method applied to method-level
    /// arguments. Normalized: an empty instantiation yields `def` itself.
    pub fn instantiated_method(&self, def: MethodId, args: TypeIdVec) -> MethodId {
        if args.is_empty() {
            return def;
        }
        debug_assert!(matches!(
            self.method_desc(def),
            MethodDesc::Ecma { .. } | MethodDesc::OnType { .. }
        ));
        self.intern_method(MethodDesc::Instantiated { def, args })
    }

    pub fn unboxing_stub(&self, kind: StubKind, target: MethodId) -> MethodId {
        self.intern_method(MethodDesc::Stub { kind, target })
    }

    pub fn method_desc(&self, m: MethodId) -> MethodDesc {
        self.methods.borrow()[m.index() as usize].clone()
    }

    pub fn method_flags(&self, m: MethodId) -> MethodFlags {
        match self.method_desc(m) {
            MethodDesc::Ecma { module, def, .. } => self.module(module).method_def(def).flags,
            MethodDesc::OnType { def, .. } | MethodDesc::Instantiated { def, .. } => {
                self.method_flags(def)
            }
            MethodDesc::Stub { target, .. } => {
                let mut flags = self.method_flags(target);
                flags.is_virtual = false;
                flags.is_newslot = false;
                flags
            }
        }
    }

    pub fn method_name(&self, m: MethodId) -> String {
        match self.method_desc(m) {
            MethodDesc::Ecma { module, def, .. } => {
                self.module(module).method_def(def).name.clone()
            }
            MethodDesc::OnType { def, .. } | MethodDesc::Instantiated { def, .. } => {
                self.method_name(def)
            }
            MethodDesc::Stub { kind, target } => {
                let suffix = match kind {
                    StubKind::Unboxing => "unbox",
                    StubKind::InstantiatingUnboxing => "unbox_inst",
                };
                format!("{}__{}", self.method_name(target), suffix)
            }
        }
    }

    /// The owning type: instantiated when the method is viewed on an
    /// instantiated owner.
    pub fn method_owner(&self, m: MethodId) -> TypeId {
        match self.method_desc(m) {
            MethodDesc::Ecma { owner, .. } => owner,
            MethodDesc::OnType { owner, .. } => owner,
            MethodDesc::Instantiated { def, .. } => self.method_owner(def),
            MethodDesc::Stub { target, .. } => self.method_owner(target),
        }
    }

    /// Method-level instantiation arguments, empty when not generic or open.
    pub fn method_instantiation(&self, m: MethodId) -> TypeIdVec {
        match self.method_desc(m) {
            MethodDesc::Instantiated { args, .. } => args,
            MethodDesc::Stub { target, .. } => self.method_instantiation(target),
            _ => TypeIdVec::new(),
        }
    }

    /// Resolve through wrappers to the metadata definition row.
    pub fn method_ecma(&self, m: MethodId) -> (ModuleId, MethodDefId) {
        match self.method_desc(m) {
            MethodDesc::Ecma { module, def, .. } => (module, def),
            MethodDesc::OnType { def, .. }
            | MethodDesc::Instantiated { def, .. }
            | MethodDesc::Stub { target: def, .. } => self.method_ecma(def),
        }
    }

    /// The definition handle of a method, with wrappers peeled: the `Ecma`
    /// method on the uninstantiated owner.
    pub fn method_definition(&self, m: MethodId) -> MethodId {
        let (module, def) = self.method_ecma(m);
        self.ecma_method(module, def)
    }

    /// The method's own signature, with owner and method instantiations
    /// applied. Vararg signatures are rejected here with `BadImageFormat`.
    pub fn method_signature(&self, m: MethodId) -> TypeSystemResult<SigId> {
        let (module, def) = self.method_ecma(m);
        let open = self.def_signature(module, def)?;
        let owner_args = self.type_instantiation(self.method_owner(m));
        let method_args = self.method_instantiation(m);
        if owner_args.is_empty() && method_args.is_empty() {
            return Ok(open);
        }
        Ok(self.instantiate_signature(open, &owner_args, &method_args))
    }

    /// All method definitions declared by a type, viewed on that type.
    pub fn methods_of(&self, ty: TypeId) -> Vec<MethodId> {
        let def_ty = self.type_definition(ty);
        let TypeDesc::Def { module, def } = self.type_desc(def_ty) else {
            return Vec::new();
        };
        let m = self.module(module);
        m.type_def(def)
            .methods
            .iter()
            .map(|&mdef| {
                let ecma = self.ecma_method(module, mdef);
                self.method_on_type(ecma, ty)
            })
            .collect()
    }

    // ========================================================================
    // Field interning
    // ========================================================================

    pub(crate) fn intern_field(&self, desc: FieldDesc) -> FieldId {
        if let Some(&id) = self.field_intern.borrow().get(&desc) {
            return id;
        }
        let mut fields = self.fields.borrow_mut();
        let id = FieldId::new(fields.len() as u32);
        fields.push(desc.clone());
        self.field_intern.borrow_mut().insert(desc, id);
        id
    }

    pub fn ecma_field(&self, module: ModuleId, def: FieldDefId) -> FieldId {
        let owner_def = self.module(module).field_def(def).owner;
        let owner = self.def_type(module, owner_def);
        self.intern_field(FieldDesc::Ecma { module, def, owner })
    }

    pub fn field_on_type(&self, def: FieldId, owner: TypeId) -> FieldId {
        debug_assert!(matches!(self.field_desc(def), FieldDesc::Ecma { .. }));
        if !matches!(self.type_desc(owner), TypeDesc::Instantiated { .. }) {
            return def;
        }
        self.intern_field(FieldDesc::OnType { def, owner })
    }

    pub fn field_desc(&self, f: FieldId) -> FieldDesc {
        self.fields.borrow()[f.index() as usize].clone()
    }

    pub fn field_ecma(&self, f: FieldId) -> (ModuleId, FieldDefId) {
        match self.field_desc(f) {
            FieldDesc::Ecma { module, def, .. } => (module, def),
            FieldDesc::OnType { def, .. } => self.field_ecma(def),
        }
    }

    pub fn field_name(&self, f: FieldId) -> String {
        let (module, def) = self.field_ecma(f);
        self.module(module).field_def(def).name.clone()
    }

    pub fn field_owner(&self, f: FieldId) -> TypeId {
        match self.field_desc(f) {
            FieldDesc::Ecma { owner, .. } => owner,
            FieldDesc::OnType { owner, .. } => owner,
        }
    }

    /// Instance field types of a type, with the owner instantiation applied.
    pub fn instance_field_types(&self, ty: TypeId) -> TypeSystemResult<Vec<TypeId>> {
        let def_ty = self.type_definition(ty);
        let TypeDesc::Def { module, def } = self.type_desc(def_ty) else {
            return Ok(Vec::new());
        };
        let args = self.type_instantiation(ty);
        let m = self.module(module);
        let mut out = Vec::new();
        for &fdef in &m.type_def(def).fields {
            let field = m.field_def(fdef);
            if field.is_static {
                continue;
            }
            let resolved = self.resolve_type_expr(&field.ty, module, &args, &[])?;
            out.push(resolved);
        }
        Ok(out)
    }

    // ========================================================================
    // Signatures and strings
    // ========================================================================

    pub fn intern_signature(&self, sig: MethodSignature) -> SigId {
        if let Some(&id) = self.sig_intern.borrow().get(&sig) {
            return id;
        }
        let mut sigs = self.sigs.borrow_mut();
        let id = SigId::new(sigs.len() as u32);
        sigs.push(sig.clone());
        self.sig_intern.borrow_mut().insert(sig, id);
        id
    }

    pub fn signature(&self, sig: SigId) -> MethodSignature {
        self.sigs.borrow()[sig.index() as usize].clone()
    }

    pub fn intern_string(&self, value: &str) -> StringId {
        if let Some(&id) = self.string_intern.borrow().get(value) {
            return id;
        }
        let mut strings = self.strings.borrow_mut();
        let id = StringId::new(strings.len() as u32);
        strings.push(value.to_string());
        self.string_intern.borrow_mut().insert(value.to_string(), id);
        id
    }

    pub fn string(&self, id: StringId) -> String {
        self.strings.borrow()[id.index() as usize].clone()
    }
}

impl Default for TypeSystemContext {
    fn default() -> Self {
        Self::new()
    }
}
