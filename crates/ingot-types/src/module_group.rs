// module_group.rs
//
// The version-bubble policy: which entities belong to this compilation.
// The group is the sole source of truth for locality; nothing else may
// second-guess it.

use rustc_hash::FxHashSet;

use ingot_identity::{MethodId, ModuleId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::MethodDesc;

pub trait ModuleGroup {
    /// Does the compilation own the type's descriptor.
    fn contains_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool;

    /// Does the compilation own the method's body. Unboxing stubs follow
    /// their target.
    fn contains_method_body(
        &self,
        ctx: &TypeSystemContext,
        method: MethodId,
        unboxing_stub: bool,
    ) -> bool;

    /// Stronger than `contains_method_body`: the caller may inline across
    /// this method because it versions with the compilation output.
    fn versions_with_method_body(&self, ctx: &TypeSystemContext, method: MethodId) -> bool;

    fn versions_with_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool;

    /// The synthetic module that owns generated stubs.
    fn generated_assembly(&self) -> ModuleId;
}

/// Everything loaded into the context is part of the compilation.
pub struct SingleFileGroup {
    generated: ModuleId,
}

impl SingleFileGroup {
    pub fn new(ctx: &TypeSystemContext) -> Self {
        Self {
            generated: ctx.generated_module(),
        }
    }
}

impl ModuleGroup for SingleFileGroup {
    fn contains_type(&self, _ctx: &TypeSystemContext, _ty: TypeId) -> bool {
        true
    }

    fn contains_method_body(
        &self,
        _ctx: &TypeSystemContext,
        _method: MethodId,
        _unboxing_stub: bool,
    ) -> bool {
        true
    }

    fn versions_with_method_body(&self, _ctx: &TypeSystemContext, _method: MethodId) -> bool {
        true
    }

    fn versions_with_type(&self, _ctx: &TypeSystemContext, _ty: TypeId) -> bool {
        true
    }

    fn generated_assembly(&self) -> ModuleId {
        self.generated
    }
}

/// One compiled module plus a set of modules it may co-optimise with.
/// Types and bodies are owned only when defined by the primary module;
/// inlining is allowed anywhere inside the bubble.
pub struct VersionBubbleGroup {
    primary: ModuleId,
    bubble: FxHashSet<ModuleId>,
    generated: ModuleId,
}

impl VersionBubbleGroup {
    pub fn new(
        ctx: &TypeSystemContext,
        primary: ModuleId,
        bubble: impl IntoIterator<Item = ModuleId>,
    ) -> Self {
        let mut set: FxHashSet<ModuleId> = bubble.into_iter().collect();
        set.insert(primary);
        set.insert(ctx.generated_module());
        Self {
            primary,
            bubble: set,
            generated: ctx.generated_module(),
        }
    }
}

impl ModuleGroup for VersionBubbleGroup {
    fn contains_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool {
        ctx.defining_module(ty) == self.primary
    }

    fn contains_method_body(
        &self,
        ctx: &TypeSystemContext,
        method: MethodId,
        _unboxing_stub: bool,
    ) -> bool {
        let owner = match ctx.method_desc(method) {
            MethodDesc::Stub { target, .. } => ctx.method_owner(target),
            _ => ctx.method_owner(method),
        };
        self.contains_type(ctx, owner)
    }

    fn versions_with_method_body(&self, ctx: &TypeSystemContext, method: MethodId) -> bool {
        let owner = ctx.method_owner(method);
        self.versions_with_type(ctx, owner)
            && ctx
                .method_instantiation(method)
                .iter()
                .all(|&arg| self.versions_with_type(ctx, arg))
    }

    fn versions_with_type(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool {
        let defining = ctx.defining_module(ty);
        if !self.bubble.contains(&defining) && defining != ctx.system_module() {
            return false;
        }
        ctx.type_instantiation(ty)
            .iter()
            .all(|&arg| self.versions_with_type(ctx, arg))
    }

    fn generated_assembly(&self) -> ModuleId {
        self.generated
    }
}

/// Nothing is local: every entity is an external reference.
pub struct ExternalGroup {
    generated: ModuleId,
}

impl ExternalGroup {
    pub fn new(ctx: &TypeSystemContext) -> Self {
        Self {
            generated: ctx.generated_module(),
        }
    }
}

impl ModuleGroup for ExternalGroup {
    fn contains_type(&self, _ctx: &TypeSystemContext, _ty: TypeId) -> bool {
        false
    }

    fn contains_method_body(
        &self,
        _ctx: &TypeSystemContext,
        _method: MethodId,
        _unboxing_stub: bool,
    ) -> bool {
        false
    }

    fn versions_with_method_body(&self, _ctx: &TypeSystemContext, _method: MethodId) -> bool {
        false
    }

    fn versions_with_type(&self, _ctx: &TypeSystemContext, _ty: TypeId) -> bool {
        false
    }

    fn generated_assembly(&self) -> ModuleId {
        self.generated
    }
}
