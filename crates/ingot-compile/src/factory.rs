// factory.rs
//
// The node factory: an interning cache from type-system entities to graph
// nodes. The named constructors encode compilation policy -- external
// methods become extern symbols, shared generic instantiations become
// shadow concrete nodes over one canonical body, canonical-containing types
// get canonical descriptors. Within one pass exactly one node exists per
// key; the scanner and compiler build independent factories.

use rustc_hash::FxHashMap;

use ingot_graph::NodeId;
use ingot_identity::{FieldId, MethodId, ModuleId, StringId, TypeId};
use ingot_types::{CanonKind, MethodDesc, ModuleGroup, StubKind, TypeSystemContext, TypeSystemResult};

use crate::config::{CompilationMode, CompilerConfig};
use crate::key::{HelperId, HelperTarget, NodeKey};
use crate::metadata::MetadataManager;

/// Everything dependency computation reads besides the factory itself.
pub struct CompileEnv<'e> {
    pub ctx: &'e TypeSystemContext,
    pub group: &'e dyn ModuleGroup,
    pub config: &'e CompilerConfig,
    pub metadata: &'e dyn MetadataManager,
    pub mode: CompilationMode,
}

pub struct NodeFactory {
    mode: CompilationMode,
    keys: Vec<NodeKey>,
    intern: FxHashMap<NodeKey, NodeId>,
}

impl NodeFactory {
    pub fn new(mode: CompilationMode) -> Self {
        Self {
            mode,
            keys: Vec::new(),
            intern: FxHashMap::default(),
        }
    }

    pub fn mode(&self) -> CompilationMode {
        self.mode
    }

    pub fn intern(&mut self, key: NodeKey) -> NodeId {
        if let Some(&id) = self.intern.get(&key) {
            return id;
        }
        let id = NodeId::new(self.keys.len() as u32);
        self.keys.push(key);
        self.intern.insert(key, id);
        id
    }

    pub fn key(&self, node: NodeId) -> NodeKey {
        self.keys[node.index() as usize]
    }

    pub fn lookup(&self, key: NodeKey) -> Option<NodeId> {
        self.intern.get(&key).copied()
    }

    pub fn node_count(&self) -> usize {
        self.keys.len()
    }

    /// All interned keys in creation order, paired with their ids.
    pub fn keys(&self) -> impl Iterator<Item = (NodeId, NodeKey)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, &k)| (NodeId::new(i as u32), k))
    }

    // ========================================================================
    // Named constructors
    // ========================================================================

    /// Code for a method. Routes on policy: external bodies become extern
    /// symbols, shared instantiations become shadow concrete nodes pointing
    /// at the canonical body.
    pub fn method_entrypoint(&mut self, env: &CompileEnv, method: MethodId) -> NodeId {
        let is_stub = matches!(env.ctx.method_desc(method), MethodDesc::Stub { .. });
        if !env.group.contains_method_body(env.ctx, method, is_stub) {
            return self.intern(NodeKey::ExternMethod(method));
        }
        let canonical = env.ctx.canonical_method_target(method, CanonKind::Specific);
        if canonical != method {
            return self.intern(NodeKey::ShadowConcreteMethod(method));
        }
        if env.ctx.is_canonical_method(method) {
            return self.intern(NodeKey::CanonicalEntrypoint(method));
        }
        self.intern(NodeKey::MethodEntrypoint(method))
    }

    /// The shared canonical body a method's instantiation maps to.
    pub fn canonical_entrypoint(&mut self, env: &CompileEnv, method: MethodId) -> NodeId {
        let canonical = env.ctx.canonical_method_target(method, CanonKind::Specific);
        if !env.group.contains_method_body(env.ctx, canonical, false) {
            return self.intern(NodeKey::ExternMethod(canonical));
        }
        if env.ctx.is_canonical_method(canonical) {
            self.intern(NodeKey::CanonicalEntrypoint(canonical))
        } else {
            self.intern(NodeKey::MethodEntrypoint(canonical))
        }
    }

    /// Entrypoint of a virtual method on a value type, reached through a
    /// boxed `this`. Canonical targets get the instantiating thunk that
    /// also supplies the hidden dictionary argument.
    pub fn unboxing_thunk(&mut self, env: &CompileEnv, target: MethodId) -> NodeId {
        let kind = if env.ctx.is_canonical_method(target) {
            StubKind::InstantiatingUnboxing
        } else {
            StubKind::Unboxing
        };
        let stub = env.ctx.unboxing_stub(kind, target);
        self.method_entrypoint(env, stub)
    }

    /// Runtime type descriptor for a type that gets instances.
    pub fn constructed_type_symbol(&mut self, env: &CompileEnv, ty: TypeId) -> NodeId {
        if !env.group.contains_type(env.ctx, ty) {
            return self.intern(NodeKey::ExternalType(ty));
        }
        if env.ctx.is_canonical_subtype(ty, CanonKind::Specific) {
            return self.intern(NodeKey::CanonicalType(ty));
        }
        self.intern(NodeKey::ConstructedType(ty))
    }

    /// Runtime type descriptor without construction (casts, tokens,
    /// field layout).
    pub fn necessary_type_symbol(&mut self, env: &CompileEnv, ty: TypeId) -> NodeId {
        if !env.group.contains_type(env.ctx, ty) {
            return self.intern(NodeKey::ExternalType(ty));
        }
        if env.ctx.is_canonical_subtype(ty, CanonKind::Specific) {
            return self.intern(NodeKey::CanonicalType(ty));
        }
        self.intern(NodeKey::NecessaryType(ty))
    }

    pub fn vtable(&mut self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::VTable(ty))
    }

    pub fn interface_dispatch_map(&mut self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::InterfaceDispatchMap(ty))
    }

    /// Use of a virtual slot. Normalized to the slot-defining declaration;
    /// generic virtual methods route to the dynamic dispatch node keyed by
    /// the canonicalized instantiated declaration.
    pub fn virtual_method_use(
        &mut self,
        env: &CompileEnv,
        decl: MethodId,
    ) -> TypeSystemResult<NodeId> {
        let slot = env.ctx.find_slot_defining_method(decl)?;
        let inst = env.ctx.method_instantiation(decl);
        if inst.is_empty() {
            return Ok(self.intern(NodeKey::VirtualMethodUse(slot)));
        }
        let instantiated = env.ctx.instantiated_method(slot, inst);
        let canonical = env.ctx.canonical_method_target(instantiated, CanonKind::Specific);
        Ok(self.intern(NodeKey::GvmDependencies(canonical)))
    }

    /// Concrete dictionary for one instantiation of shared code.
    pub fn generic_dictionary(&mut self, method: MethodId) -> NodeId {
        self.intern(NodeKey::GenericDictionary(method))
    }

    pub fn ready_to_run_helper(&mut self, helper: HelperId, target: HelperTarget) -> NodeId {
        self.intern(NodeKey::ReadyToRunHelper(helper, target))
    }

    pub fn extern_method_symbol(&mut self, method: MethodId) -> NodeId {
        self.intern(NodeKey::ExternMethod(method))
    }

    pub fn external_type_node(&mut self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::ExternalType(ty))
    }

    pub fn string_literal(&mut self, env: &CompileEnv, value: &str) -> NodeId {
        let id = env.ctx.intern_string(value);
        self.intern(NodeKey::StringLiteral(id))
    }

    pub fn string_literal_id(&mut self, id: StringId) -> NodeId {
        self.intern(NodeKey::StringLiteral(id))
    }

    pub fn field_rva_data(&mut self, field: FieldId) -> NodeId {
        self.intern(NodeKey::FieldRvaData(field))
    }

    pub fn module_metadata(&mut self, module: ModuleId) -> NodeId {
        self.intern(NodeKey::ModuleMetadata(module))
    }

    pub fn type_metadata(&mut self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::TypeMetadata(ty))
    }

    pub fn method_metadata(&mut self, method: MethodId) -> NodeId {
        self.intern(NodeKey::MethodMetadata(method))
    }

    pub fn field_metadata(&mut self, field: FieldId) -> NodeId {
        self.intern(NodeKey::FieldMetadata(field))
    }

    pub fn reflectable_type(&mut self, ty: TypeId) -> NodeId {
        self.intern(NodeKey::ReflectableType(ty))
    }

    pub fn reflectable_method(&mut self, method: MethodId) -> NodeId {
        self.intern(NodeKey::ReflectableMethod(method))
    }

    /// Diagnostic name of a node.
    pub fn node_name(&self, ctx: &TypeSystemContext, node: NodeId) -> String {
        match self.key(node) {
            NodeKey::MethodEntrypoint(m) => format!("MethodEntrypoint {}", ctx.method_display(m)),
            NodeKey::CanonicalEntrypoint(m) => {
                format!("CanonicalEntrypoint {}", ctx.method_display(m))
            }
            NodeKey::ShadowConcreteMethod(m) => {
                format!("ShadowConcreteMethod {}", ctx.method_display(m))
            }
            NodeKey::ExternMethod(m) => format!("ExternMethod {}", ctx.method_display(m)),
            NodeKey::ConstructedType(t) => format!("ConstructedType {}", ctx.type_name(t)),
            NodeKey::NecessaryType(t) => format!("NecessaryType {}", ctx.type_name(t)),
            NodeKey::CanonicalType(t) => format!("CanonicalType {}", ctx.type_name(t)),
            NodeKey::ExternalType(t) => format!("ExternalType {}", ctx.type_name(t)),
            NodeKey::VTable(t) => format!("VTable {}", ctx.type_name(t)),
            NodeKey::InterfaceDispatchMap(t) => {
                format!("InterfaceDispatchMap {}", ctx.type_name(t))
            }
            NodeKey::VirtualMethodUse(m) => format!("VirtualMethodUse {}", ctx.method_display(m)),
            NodeKey::GvmDependencies(m) => format!("GvmDependencies {}", ctx.method_display(m)),
            NodeKey::GenericDictionary(m) => {
                format!("GenericDictionary {}", ctx.method_display(m))
            }
            NodeKey::ReadyToRunHelper(id, target) => {
                let target = match target {
                    HelperTarget::Type(t) => ctx.type_name(t),
                    HelperTarget::Method(m) => ctx.method_display(m),
                    HelperTarget::Field(f) => ctx.field_name(f),
                };
                format!("ReadyToRunHelper {:?} {}", id, target)
            }
            NodeKey::StringLiteral(s) => format!("StringLiteral {:?}", ctx.string(s)),
            NodeKey::FieldRvaData(f) => format!("FieldRvaData {}", ctx.field_name(f)),
            NodeKey::ModuleMetadata(m) => {
                format!("ModuleMetadata {}", ctx.module(m).name)
            }
            NodeKey::TypeMetadata(t) => format!("TypeMetadata {}", ctx.type_name(t)),
            NodeKey::MethodMetadata(m) => format!("MethodMetadata {}", ctx.method_display(m)),
            NodeKey::FieldMetadata(f) => format!("FieldMetadata {}", ctx.field_name(f)),
            NodeKey::ReflectableType(t) => format!("ReflectableType {}", ctx.type_name(t)),
            NodeKey::ReflectableMethod(m) => {
                format!("ReflectableMethod {}", ctx.method_display(m))
            }
        }
    }
}
