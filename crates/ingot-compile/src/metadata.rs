// metadata.rs
//
// Reflection metadata policy: which entities get a description, which keep
// a runtime mapping, and what extra dependencies reflectability drags in.

use std::cell::RefCell;

use rustc_hash::FxHashSet;

use ingot_graph::Edge;
use ingot_identity::{FieldId, MethodId, TypeId};
use ingot_types::{CanonKind, MethodDesc, TypeDesc, TypeSystemContext};

use crate::factory::{CompileEnv, NodeFactory};
use crate::key::NodeKey;
use crate::oracles::ScanResults;

/// Which metadata an entity receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataCategory {
    /// Searchable description (names, signatures).
    pub description: bool,
    /// Mapping from description back to the runtime artifact.
    pub runtime_mapping: bool,
}

impl MetadataCategory {
    pub const NONE: MetadataCategory = MetadataCategory {
        description: false,
        runtime_mapping: false,
    };

    pub const FULL: MetadataCategory = MetadataCategory {
        description: true,
        runtime_mapping: true,
    };

    pub fn is_none(&self) -> bool {
        !self.description && !self.runtime_mapping
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EntityRef {
    Type(TypeId),
    Method(MethodId),
    Field(FieldId),
}

/// End-of-compile metadata: the serialized blob plus entity-to-offset maps.
#[derive(Debug, Default)]
pub struct MetadataResult {
    pub blob: Vec<u8>,
    pub type_map: Vec<(TypeId, u32)>,
    pub method_map: Vec<(MethodId, u32)>,
    pub field_map: Vec<(FieldId, u32)>,
}

/// The reflection-blocking policy: synthetic entities, the shared array
/// implementation, and attribute-marked types never surface in metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockedInternals;

impl BlockedInternals {
    pub fn is_blocked(&self, ctx: &TypeSystemContext, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Type(ty) => self.is_type_blocked(ctx, ty),
            EntityRef::Method(m) => {
                if !matches!(
                    ctx.method_desc(ctx.method_definition(m)),
                    MethodDesc::Ecma { .. }
                ) {
                    return true;
                }
                if matches!(ctx.method_desc(m), MethodDesc::Stub { .. }) {
                    return true;
                }
                self.is_type_blocked(ctx, ctx.method_owner(m))
            }
            EntityRef::Field(f) => self.is_type_blocked(ctx, ctx.field_owner(f)),
        }
    }

    fn is_type_blocked(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool {
        let def_ty = ctx.type_definition(ty);
        match ctx.type_desc(def_ty) {
            TypeDesc::Def { module, def } => {
                if module == ctx.generated_module() {
                    return true;
                }
                let m = ctx.module(module);
                let td = m.type_def(def);
                if td.reflection_blocked {
                    return true;
                }
                // The shared generic array implementation is internal.
                module == ctx.system_module() && td.name == "Array`1"
            }
            // Parameterized shapes follow their element.
            TypeDesc::Array { element, .. }
            | TypeDesc::ByRef(element)
            | TypeDesc::Pointer(element) => self.is_type_blocked(ctx, element),
            TypeDesc::FunctionPointer(_) | TypeDesc::GenericParam { .. } => true,
            TypeDesc::Instantiated { .. } => unreachable!("definition resolved above"),
        }
    }
}

pub trait MetadataManager {
    fn metadata_category(&self, ctx: &TypeSystemContext, entity: EntityRef) -> MetadataCategory;

    fn is_reflection_blocked(&self, ctx: &TypeSystemContext, entity: EntityRef) -> bool;

    /// Extra edges an entity needs in order to be reflectable.
    fn dependencies_due_to_reflectability(
        &self,
        env: &CompileEnv,
        factory: &mut NodeFactory,
        entity: EntityRef,
        deps: &mut Vec<Edge>,
    ) {
        let _ = (env, factory, entity, deps);
    }

    fn has_reflection_invoke_stub(&self, ctx: &TypeSystemContext, method: MethodId) -> bool;

    /// The shared invoke stub servicing all instantiations of a method.
    fn canonical_reflection_invoke_stub(
        &self,
        ctx: &TypeSystemContext,
        method: MethodId,
    ) -> Option<MethodId> {
        if !self.has_reflection_invoke_stub(ctx, method) {
            return None;
        }
        Some(ctx.canonical_method_target(method, CanonKind::Specific))
    }

    /// Record reflectability discovered mid-scan. Only the scanner policy
    /// keeps state here.
    fn note_reflectable(&self, entity: EntityRef) {
        let _ = entity;
    }

    /// Produce the metadata blob and maps from the marked node set.
    fn compute_metadata(
        &self,
        ctx: &TypeSystemContext,
        marked_keys: &[NodeKey],
    ) -> MetadataResult;
}

/// No reflection at all.
#[derive(Debug, Default)]
pub struct EmptyMetadataManager;

impl MetadataManager for EmptyMetadataManager {
    fn metadata_category(&self, _ctx: &TypeSystemContext, _entity: EntityRef) -> MetadataCategory {
        MetadataCategory::NONE
    }

    fn is_reflection_blocked(&self, _ctx: &TypeSystemContext, _entity: EntityRef) -> bool {
        true
    }

    fn has_reflection_invoke_stub(&self, _ctx: &TypeSystemContext, _method: MethodId) -> bool {
        false
    }

    fn compute_metadata(
        &self,
        _ctx: &TypeSystemContext,
        _marked_keys: &[NodeKey],
    ) -> MetadataResult {
        MetadataResult::default()
    }
}

/// Explicitly listed entities get description and runtime mapping.
#[derive(Debug, Default)]
pub struct CompilerGeneratedMetadataManager {
    blocked: BlockedInternals,
    types: FxHashSet<TypeId>,
    methods: FxHashSet<MethodId>,
}

impl CompilerGeneratedMetadataManager {
    pub fn new(
        types: impl IntoIterator<Item = TypeId>,
        methods: impl IntoIterator<Item = MethodId>,
    ) -> Self {
        Self {
            blocked: BlockedInternals,
            types: types.into_iter().collect(),
            methods: methods.into_iter().collect(),
        }
    }
}

impl MetadataManager for CompilerGeneratedMetadataManager {
    fn metadata_category(&self, ctx: &TypeSystemContext, entity: EntityRef) -> MetadataCategory {
        if self.is_reflection_blocked(ctx, entity) {
            return MetadataCategory::NONE;
        }
        let listed = match entity {
            EntityRef::Type(ty) => self.types.contains(&ty),
            EntityRef::Method(m) => self.methods.contains(&m),
            EntityRef::Field(_) => false,
        };
        if listed {
            MetadataCategory::FULL
        } else {
            MetadataCategory::NONE
        }
    }

    fn is_reflection_blocked(&self, ctx: &TypeSystemContext, entity: EntityRef) -> bool {
        self.blocked.is_blocked(ctx, entity)
    }

    fn has_reflection_invoke_stub(&self, ctx: &TypeSystemContext, method: MethodId) -> bool {
        self.methods.contains(&method)
            && !self.is_reflection_blocked(ctx, EntityRef::Method(method))
    }

    fn compute_metadata(&self, ctx: &TypeSystemContext, marked_keys: &[NodeKey]) -> MetadataResult {
        serialize_metadata(ctx, marked_keys, |entity| {
            !self.metadata_category(ctx, entity).is_none()
        })
    }
}

/// Scan-phase policy: defers blob generation, records reflectability so the
/// edges thread through the scan graph.
#[derive(Debug, Default)]
pub struct ScannerMetadataManager {
    blocked: BlockedInternals,
    types: RefCell<FxHashSet<TypeId>>,
    methods: RefCell<FxHashSet<MethodId>>,
}

impl ScannerMetadataManager {
    pub fn recorded_types(&self) -> FxHashSet<TypeId> {
        self.types.borrow().clone()
    }

    pub fn recorded_methods(&self) -> FxHashSet<MethodId> {
        self.methods.borrow().clone()
    }
}

impl MetadataManager for ScannerMetadataManager {
    fn metadata_category(&self, ctx: &TypeSystemContext, entity: EntityRef) -> MetadataCategory {
        if self.is_reflection_blocked(ctx, entity) {
            MetadataCategory::NONE
        } else {
            MetadataCategory::FULL
        }
    }

    fn is_reflection_blocked(&self, ctx: &TypeSystemContext, entity: EntityRef) -> bool {
        self.blocked.is_blocked(ctx, entity)
    }

    fn has_reflection_invoke_stub(&self, ctx: &TypeSystemContext, method: MethodId) -> bool {
        !self.is_reflection_blocked(ctx, EntityRef::Method(method))
    }

    fn note_reflectable(&self, entity: EntityRef) {
        match entity {
            EntityRef::Type(ty) => {
                self.types.borrow_mut().insert(ty);
            }
            EntityRef::Method(m) => {
                self.methods.borrow_mut().insert(m);
            }
            EntityRef::Field(_) => {}
        }
    }

    fn compute_metadata(
        &self,
        _ctx: &TypeSystemContext,
        _marked_keys: &[NodeKey],
    ) -> MetadataResult {
        // Two-phase: the scanner only records; the compiler-side manager
        // produces the blob.
        MetadataResult::default()
    }
}

/// Compile-phase policy fed by the scan: everything the scanner saw as
/// compiled or recorded becomes reflectable unless blocked.
#[derive(Debug)]
pub struct UsageBasedMetadataManager {
    blocked: BlockedInternals,
    methods: FxHashSet<MethodId>,
    types: FxHashSet<TypeId>,
}

impl UsageBasedMetadataManager {
    pub fn from_scan(scan: &ScanResults) -> Self {
        let mut methods: FxHashSet<MethodId> = scan.compiled_methods().collect();
        methods.extend(scan.invokable_methods().iter().copied());
        let mut types: FxHashSet<TypeId> = scan.invokable_types().iter().copied().collect();
        types.extend(scan.types_with_metadata().iter().copied());
        Self {
            blocked: BlockedInternals,
            methods,
            types,
        }
    }
}

impl MetadataManager for UsageBasedMetadataManager {
    fn metadata_category(&self, ctx: &TypeSystemContext, entity: EntityRef) -> MetadataCategory {
        if self.is_reflection_blocked(ctx, entity) {
            return MetadataCategory::NONE;
        }
        let seen = match entity {
            EntityRef::Type(ty) => self.types.contains(&ty),
            EntityRef::Method(m) => self.methods.contains(&m),
            EntityRef::Field(_) => true,
        };
        if seen {
            MetadataCategory::FULL
        } else {
            MetadataCategory::NONE
        }
    }

    fn is_reflection_blocked(&self, ctx: &TypeSystemContext, entity: EntityRef) -> bool {
        self.blocked.is_blocked(ctx, entity)
    }

    fn has_reflection_invoke_stub(&self, ctx: &TypeSystemContext, method: MethodId) -> bool {
        self.methods.contains(&method)
            && !self.is_reflection_blocked(ctx, EntityRef::Method(method))
    }

    fn compute_metadata(&self, ctx: &TypeSystemContext, marked_keys: &[NodeKey]) -> MetadataResult {
        serialize_metadata(ctx, marked_keys, |entity| {
            !self.metadata_category(ctx, entity).is_none()
        })
    }
}

/// Deterministic blob layout: for each admitted metadata node in marked
/// order, a length-prefixed display name; maps point at the name offsets.
fn serialize_metadata(
    ctx: &TypeSystemContext,
    marked_keys: &[NodeKey],
    admit: impl Fn(EntityRef) -> bool,
) -> MetadataResult {
    let mut result = MetadataResult::default();

    let mut write = |blob: &mut Vec<u8>, name: &str| -> u32 {
        let offset = blob.len() as u32;
        let bytes = name.as_bytes();
        blob.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        blob.extend_from_slice(bytes);
        offset
    };

    for key in marked_keys {
        match *key {
            NodeKey::TypeMetadata(ty) if admit(EntityRef::Type(ty)) => {
                let offset = write(&mut result.blob, &ctx.type_name(ty));
                result.type_map.push((ty, offset));
            }
            NodeKey::MethodMetadata(m) if admit(EntityRef::Method(m)) => {
                let offset = write(&mut result.blob, &ctx.method_display(m));
                result.method_map.push((m, offset));
            }
            NodeKey::FieldMetadata(f) if admit(EntityRef::Field(f)) => {
                let offset = write(&mut result.blob, &ctx.field_name(f));
                result.field_map.push((f, offset));
            }
            _ => {}
        }
    }
    result
}
