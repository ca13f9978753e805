//! Type system algebra for the AOT compiler: interned entities, generic
//! instantiation, canonical forms, virtual slot resolution, and the
//! module-group (version bubble) policy.

pub mod canon;
pub mod context;
pub mod desc;
pub mod display;
pub mod error;
pub mod instantiate;
pub mod module;
pub mod module_group;
pub mod virtuals;

pub use context::{TypeSystemContext, WellKnownTypes};
pub use desc::{
    CanonKind, FieldDesc, GenericParamOwner, MethodDesc, MethodFlags, MethodSignature,
    PrimitiveKind, StubKind, TypeDesc, TypeFlags, TypeIdVec, Variance,
};
pub use error::{TypeSystemError, TypeSystemResult};
pub use module::{
    EcmaModule, FieldData, FieldExpr, GenericParamData, Instr, MethodData, MethodExpr,
    MethodImplData, ModuleData, SectionData, SignatureData, TypeData, TypeDefKind, TypeExpr,
};
pub use module_group::{ExternalGroup, ModuleGroup, SingleFileGroup, VersionBubbleGroup};

#[cfg(test)]
mod tests;
