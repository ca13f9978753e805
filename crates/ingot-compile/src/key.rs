// key.rs
//
// The interned key space of the node factory. Keys are the stable identity
// of graph nodes; edges reference keys, never owning pointers, so cyclic
// node references cost nothing.

use ingot_identity::{FieldId, MethodId, ModuleId, StringId, TypeId};

/// Ready-to-run helper identities, keyed together with their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperId {
    New,
    NewArr,
    Box,
    Unbox,
    CastClass,
    IsInstanceOf,
    TypeHandle,
    MethodHandle,
    FieldHandle,
    GetStaticBase,
    GetThreadStaticBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperTarget {
    Type(TypeId),
    Method(MethodId),
    Field(FieldId),
}

/// The closed set of node families. One node exists per key within a pass;
/// scanner and compiler build independent factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// Code body for a concrete, unshared method.
    MethodEntrypoint(MethodId),
    /// Shared body of a canonical method.
    CanonicalEntrypoint(MethodId),
    /// One concrete instantiation of shared code: owns no body, tracks the
    /// canonical body plus its dictionary.
    ShadowConcreteMethod(MethodId),
    /// Entry stub for a method outside the compilation.
    ExternMethod(MethodId),
    /// Runtime type descriptor for a type with concrete instances.
    ConstructedType(TypeId),
    /// Runtime type descriptor without instances (casts, tokens).
    NecessaryType(TypeId),
    /// Descriptor for a canonical form; never constructed directly.
    CanonicalType(TypeId),
    /// Reference to a type descriptor owned by another module.
    ExternalType(TypeId),
    VTable(TypeId),
    InterfaceDispatchMap(TypeId),
    /// A virtual slot is called somewhere; keyed by the slot-defining
    /// declaration.
    VirtualMethodUse(MethodId),
    /// Generic-virtual-method dispatch: dynamic dependencies over the
    /// growing constructed-type set. Keyed by the instantiated slot
    /// declaration.
    GvmDependencies(MethodId),
    /// Concrete dictionary for one instantiation of shared code.
    GenericDictionary(MethodId),
    ReadyToRunHelper(HelperId, HelperTarget),
    StringLiteral(StringId),
    FieldRvaData(FieldId),
    ModuleMetadata(ModuleId),
    TypeMetadata(TypeId),
    MethodMetadata(MethodId),
    FieldMetadata(FieldId),
    /// The type keeps reflection description and runtime mapping.
    ReflectableType(TypeId),
    /// The method stays invokable through reflection.
    ReflectableMethod(MethodId),
}

/// One entry of a generic dictionary, stored in open form (signature
/// variables intact) and concretised per instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryEntry {
    TypeHandle(TypeId),
    MethodHandle(MethodId),
    FieldHandle(FieldId),
    /// A call stub: the entrypoint of a method whose identity depends on
    /// the instantiation.
    MethodEntrypoint(MethodId),
}
