// instantiate.rs
//
// Generic substitution over interned handles. Substitution rebuilds through
// the interning constructors, so equal results share handles automatically
// and substituting a fully-instantiated input is a fixed point.

use ingot_identity::{FieldId, MethodId, SigId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::{FieldDesc, GenericParamOwner, MethodDesc, MethodSignature, TypeDesc, TypeIdVec};

impl TypeSystemContext {
    /// Substitute signature variables with concrete types. Types without
    /// generic variables are returned unchanged.
    pub fn instantiate_type(
        &self,
        ty: TypeId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> TypeId {
        if type_args.is_empty() && method_args.is_empty() {
            return ty;
        }
        if !self.type_flags(ty).contains_generic_vars {
            return ty;
        }
        match self.type_desc(ty) {
            TypeDesc::GenericParam { owner, index } => {
                let args = match owner {
                    GenericParamOwner::Type => type_args,
                    GenericParamOwner::Method => method_args,
                };
                args.get(index as usize).copied().unwrap_or(ty)
            }
            TypeDesc::Instantiated { def, args } => {
                let new_args: TypeIdVec = args
                    .iter()
                    .map(|&a| self.instantiate_type(a, type_args, method_args))
                    .collect();
                self.instantiated_type(def, new_args)
            }
            TypeDesc::Array { element, rank } => {
                let element = self.instantiate_type(element, type_args, method_args);
                match rank {
                    None => self.array_type(element),
                    Some(rank) => self.mdarray_type(element, rank),
                }
            }
            TypeDesc::ByRef(element) => {
                let element = self.instantiate_type(element, type_args, method_args);
                self.byref_type(element)
            }
            TypeDesc::Pointer(element) => {
                let element = self.instantiate_type(element, type_args, method_args);
                self.pointer_type(element)
            }
            TypeDesc::FunctionPointer(sig) => {
                let sig = self.instantiate_signature(sig, type_args, method_args);
                self.function_pointer_type(sig)
            }
            // Definitions carry no variables.
            TypeDesc::Def { .. } => ty,
        }
    }

    /// `InstantiateSignature`: substitute through parameter and return types.
    pub fn instantiate_signature(
        &self,
        sig: SigId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> SigId {
        let signature = self.signature(sig);
        let params: TypeIdVec = signature
            .params
            .iter()
            .map(|&p| self.instantiate_type(p, type_args, method_args))
            .collect();
        let ret = self.instantiate_type(signature.ret, type_args, method_args);
        if params == signature.params && ret == signature.ret {
            return sig;
        }
        self.intern_signature(MethodSignature {
            params,
            ret,
            is_static: signature.is_static,
            is_vararg: signature.is_vararg,
        })
    }

    /// Substitute through a method handle: the owner instantiation and the
    /// method instantiation are both rebuilt.
    pub fn instantiate_method(
        &self,
        m: MethodId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> MethodId {
        match self.method_desc(m) {
            MethodDesc::Ecma { .. } => m,
            MethodDesc::OnType { def, owner } => {
                let owner = self.instantiate_type(owner, type_args, method_args);
                self.method_on_type(def, owner)
            }
            MethodDesc::Instantiated { def, args } => {
                let def = self.instantiate_method(def, type_args, method_args);
                let args: TypeIdVec = args
                    .iter()
                    .map(|&a| self.instantiate_type(a, type_args, method_args))
                    .collect();
                self.instantiated_method(def, args)
            }
            MethodDesc::Stub { kind, target } => {
                let target = self.instantiate_method(target, type_args, method_args);
                self.unboxing_stub(kind, target)
            }
        }
    }

    /// Substitute through a field handle's owner.
    pub fn instantiate_field(
        &self,
        f: FieldId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> FieldId {
        match self.field_desc(f) {
            FieldDesc::Ecma { .. } => f,
            FieldDesc::OnType { def, owner } => {
                let owner = self.instantiate_type(owner, type_args, method_args);
                self.field_on_type(def, owner)
            }
        }
    }

    /// Strip a method-level instantiation, leaving the slot-identity form.
    pub fn uninstantiated_method(&self, m: MethodId) -> MethodId {
        match self.method_desc(m) {
            MethodDesc::Instantiated { def, .. } => def,
            _ => m,
        }
    }
}
