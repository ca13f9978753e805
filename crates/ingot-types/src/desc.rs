// desc.rs
//
// Interned shapes for types, methods, fields and signatures. These are the
// values stored in the TypeSystemContext arenas; handles (TypeId, MethodId,
// FieldId, SigId) index into them and carry identity.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use ingot_identity::{FieldDefId, FieldId, MethodDefId, MethodId, ModuleId, SigId, TypeDefId, TypeId};

/// Instantiation argument vector. Most instantiations have one or two args.
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// Which flavour of canonical form a type participates in.
///
/// `Specific` collapses reference-type arguments to the `__Canon` sentinel
/// and keeps value-type arguments by identity; `Universal` collapses
/// everything to `__UniversalCanon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonKind {
    Specific,
    Universal,
}

/// Owner of a signature variable: `!n` (type) or `!!n` (method).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParamOwner {
    Type,
    Method,
}

/// Interned type shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// A metadata type definition, uninstantiated. Non-generic types are
    /// represented by this variant alone.
    Def { module: ModuleId, def: TypeDefId },
    /// A generic definition applied to concrete (or canonical) arguments.
    /// `def` always points at a `Def`.
    Instantiated { def: TypeId, args: TypeIdVec },
    /// Array over an element type. `rank: None` is the single-dimension
    /// zero-based array; `Some(n)` is a multi-dimensional array.
    Array { element: TypeId, rank: Option<u8> },
    ByRef(TypeId),
    Pointer(TypeId),
    FunctionPointer(SigId),
    /// A signature variable in an open type or method body.
    GenericParam { owner: GenericParamOwner, index: u32 },
}

/// Interned method shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodDesc {
    /// A metadata method definition on its uninstantiated owner.
    Ecma {
        module: ModuleId,
        def: MethodDefId,
        owner: TypeId,
    },
    /// A method definition viewed on an instantiated owner type.
    /// `def` always points at an `Ecma` method.
    OnType { def: MethodId, owner: TypeId },
    /// A generic method applied to method-level arguments. `def` points at
    /// an `Ecma` or `OnType` method.
    Instantiated { def: MethodId, args: TypeIdVec },
    /// Compiler-synthesised stub. Stubs are owned by the generated assembly
    /// and are never reflectable.
    Stub { kind: StubKind, target: MethodId },
}

/// Kinds of synthesised method stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubKind {
    /// Unwraps a boxed value-type `this` before calling the target.
    Unboxing,
    /// Unboxing thunk that also supplies the hidden instantiation argument
    /// required by canonical value-type code.
    InstantiatingUnboxing,
}

/// Interned field shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldDesc {
    Ecma {
        module: ModuleId,
        def: FieldDefId,
        owner: TypeId,
    },
    /// A field definition viewed on an instantiated owner type.
    OnType { def: FieldId, owner: TypeId },
}

/// Interned method signature. Open signatures contain signature variables;
/// `instantiate_signature` substitutes them away.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub params: TypeIdVec,
    pub ret: TypeId,
    pub is_static: bool,
    pub is_vararg: bool,
}

/// Primitive categories of the well-known system value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    IntPtr,
    UIntPtr,
}

impl PrimitiveKind {
    /// Element size in bytes, as used for RVA field data reads.
    /// Pointer-sized primitives assume a 64-bit target.
    pub fn element_size(self) -> usize {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::Char | PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64
            | PrimitiveKind::U64
            | PrimitiveKind::F64
            | PrimitiveKind::IntPtr
            | PrimitiveKind::UIntPtr => 8,
        }
    }
}

/// Category flags carried by every interned type. Computed eagerly at intern
/// time from the components (which are always interned first).
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFlags {
    pub primitive: Option<PrimitiveKind>,
    pub is_value_type: bool,
    pub is_interface: bool,
    pub contains_generic_vars: bool,
    /// Deepest canonical sentinel present anywhere in the type expression.
    pub canon_level: Option<CanonKind>,
}

impl TypeFlags {
    /// True for class, interface, array, string-like shapes: anything whose
    /// values are GC references.
    pub fn is_reference_type(&self) -> bool {
        !self.is_value_type && self.primitive.is_none()
    }
}

/// Boolean properties of a method definition, straight from metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_newslot: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_internal_call: bool,
    pub generic_arity: u32,
}

/// Variance of a generic parameter, used by the variant-aware interface
/// method resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}
