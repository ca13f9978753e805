// canon.rs
//
// Canonical forms. Instantiations over reference types share one body; the
// representative of the equivalence class replaces reference arguments with
// the `__Canon` sentinel (`Specific`) or every argument with
// `__UniversalCanon` (`Universal`). Conversion is idempotent and commutes
// with instantiation; value-type arguments keep identity under `Specific`
// but their own instantiations still canonicalise recursively.

use ingot_identity::{MethodId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::{CanonKind, MethodDesc, TypeDesc, TypeIdVec};

impl TypeSystemContext {
    /// `ConvertToCanonForm`: the canonical representative of a type.
    pub fn convert_to_canon_form(&self, ty: TypeId, kind: CanonKind) -> TypeId {
        match self.type_desc(ty) {
            TypeDesc::Def { .. } => ty,
            TypeDesc::Instantiated { def, args } => {
                let canon_args: TypeIdVec =
                    args.iter().map(|&a| self.canonical_arg(a, kind)).collect();
                self.instantiated_type(def, canon_args)
            }
            TypeDesc::Array { element, rank } => {
                let element = self.convert_to_canon_form(element, kind);
                match rank {
                    None => self.array_type(element),
                    Some(rank) => self.mdarray_type(element, rank),
                }
            }
            TypeDesc::ByRef(element) => {
                let element = self.convert_to_canon_form(element, kind);
                self.byref_type(element)
            }
            TypeDesc::Pointer(element) => {
                let element = self.convert_to_canon_form(element, kind);
                self.pointer_type(element)
            }
            TypeDesc::FunctionPointer(_) => ty,
            TypeDesc::GenericParam { .. } => match kind {
                CanonKind::Specific => ty,
                CanonKind::Universal => self.well_known().universal_canon,
            },
        }
    }

    /// Canonical form of one instantiation argument. Reference types
    /// collapse to the sentinel; value types keep identity under `Specific`
    /// and recurse into their own instantiations.
    pub(crate) fn canonical_arg(&self, arg: TypeId, kind: CanonKind) -> TypeId {
        match kind {
            CanonKind::Universal => self.well_known().universal_canon,
            CanonKind::Specific => {
                let flags = self.type_flags(arg);
                if flags.contains_generic_vars
                    && matches!(self.type_desc(arg), TypeDesc::GenericParam { .. })
                {
                    // Open arguments stay open; canonicalisation of the
                    // enclosing definition happens at instantiation time.
                    arg
                } else if flags.is_reference_type() {
                    self.well_known().canon
                } else {
                    self.convert_to_canon_form(arg, kind)
                }
            }
        }
    }

    /// `IsCanonicalSubtype`: does the type contain a canonical sentinel of
    /// at least the requested kind anywhere in its expression.
    pub fn is_canonical_subtype(&self, ty: TypeId, kind: CanonKind) -> bool {
        match (kind, self.type_flags(ty).canon_level) {
            (CanonKind::Specific, Some(_)) => true,
            (CanonKind::Universal, Some(CanonKind::Universal)) => true,
            _ => false,
        }
    }

    /// `GetCanonMethodTarget`: the method whose body an instantiation
    /// shares. Identity when the method has no canonicalisable content.
    pub fn canonical_method_target(&self, m: MethodId, kind: CanonKind) -> MethodId {
        if let MethodDesc::Stub { kind: stub_kind, target } = self.method_desc(m) {
            let target = self.canonical_method_target(target, kind);
            return self.unboxing_stub(stub_kind, target);
        }
        let owner = self.method_owner(m);
        let canon_owner = self.convert_to_canon_form(owner, kind);
        let def = self.method_definition(m);
        let on_owner = self.method_on_type(def, canon_owner);
        let canon_args: TypeIdVec = self
            .method_instantiation(m)
            .iter()
            .map(|&a| self.canonical_arg(a, kind))
            .collect();
        self.instantiated_method(on_owner, canon_args)
    }

    /// Whether the method is itself a canonical form (owner or method
    /// instantiation mentions a sentinel).
    pub fn is_canonical_method(&self, m: MethodId) -> bool {
        self.is_canonical_subtype(self.method_owner(m), CanonKind::Specific)
            || self
                .method_instantiation(m)
                .iter()
                .any(|&a| self.is_canonical_subtype(a, CanonKind::Specific))
    }

    /// Whether the method's body is shared: its canonical target differs
    /// from the method itself.
    pub fn shares_generic_code(&self, m: MethodId) -> bool {
        self.canonical_method_target(m, CanonKind::Specific) != m
    }
}
