// virtuals.rs
//
// Virtual slot layout and compile-time dispatch.
//
// Each type definition contributes an "introduced slot list": the declared
// virtual methods whose slot-defining ancestor is the type itself. The full
// vtable of a type is the concatenation of its chain's introduced lists,
// base first, metadata order within a definition. Introduced lists are
// cached per definition; full slot and resolved-implementation arrays are
// cached per instantiated type.
//
// Override matching is by name, parameter count, and generic arity. A
// matching virtual that is not newslot overrides; a newslot match starts a
// fresh slot and is skipped.

use std::rc::Rc;

use ingot_identity::{MethodDefId, MethodId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::{TypeDesc, Variance};
use crate::error::TypeSystemResult;

impl TypeSystemContext {
    /// The base type, with the owner's instantiation applied. Cached.
    pub fn base_type(&self, ty: TypeId) -> TypeSystemResult<Option<TypeId>> {
        if let Some(&cached) = self.base_cache.borrow().get(&ty) {
            return Ok(cached);
        }
        let result = match self.type_desc(ty) {
            TypeDesc::Def { module, def } => {
                let m = self.module(module);
                match &m.type_def(def).base {
                    Some(expr) => Some(self.resolve_type_expr(expr, module, &[], &[])?),
                    None => None,
                }
            }
            TypeDesc::Instantiated { def, args } => {
                let TypeDesc::Def { module, def } = self.type_desc(def) else {
                    unreachable!("instantiated types always wrap a definition");
                };
                let m = self.module(module);
                match &m.type_def(def).base {
                    Some(expr) => Some(self.resolve_type_expr(expr, module, &args, &[])?),
                    None => None,
                }
            }
            TypeDesc::Array { .. } => Some(self.well_known().array),
            TypeDesc::ByRef(_)
            | TypeDesc::Pointer(_)
            | TypeDesc::FunctionPointer(_)
            | TypeDesc::GenericParam { .. } => None,
        };
        self.base_cache.borrow_mut().insert(ty, result);
        Ok(result)
    }

    /// The flattened interface list: the base's interfaces, then each
    /// declared interface and its own flattened list, deduplicated in
    /// discovery order. Cached.
    pub fn runtime_interfaces(&self, ty: TypeId) -> TypeSystemResult<Rc<[TypeId]>> {
        if let Some(cached) = self.iface_cache.borrow().get(&ty) {
            return Ok(cached.clone());
        }
        let mut list: Vec<TypeId> = Vec::new();
        if let Some(base) = self.base_type(ty)? {
            list.extend(self.runtime_interfaces(base)?.iter().copied());
        }
        let def_ty = self.type_definition(ty);
        if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
            let args = self.type_instantiation(ty);
            let m = self.module(module);
            for expr in &m.type_def(def).interfaces {
                let iface = self.resolve_type_expr(expr, module, &args, &[])?;
                if !list.contains(&iface) {
                    list.push(iface);
                }
                for &inherited in self.runtime_interfaces(iface)?.iter() {
                    if !list.contains(&inherited) {
                        list.push(inherited);
                    }
                }
            }
        }
        let list: Rc<[TypeId]> = list.into();
        self.iface_cache.borrow_mut().insert(ty, list.clone());
        Ok(list)
    }

    /// Whether `ty` transitively derives from `base` (strict or reflexive).
    pub fn derives_from(&self, ty: TypeId, base: TypeId) -> TypeSystemResult<bool> {
        let mut current = Some(ty);
        while let Some(c) = current {
            if c == base {
                return Ok(true);
            }
            current = self.base_type(c)?;
        }
        Ok(false)
    }

    /// Reference-type assignability for variance checks: identity, base
    /// chain, or implemented interface. Canonical sentinels are compatible
    /// with any reference type.
    pub fn is_assignable_ref(&self, from: TypeId, to: TypeId) -> TypeSystemResult<bool> {
        if from == to {
            return Ok(true);
        }
        let from_flags = self.type_flags(from);
        let to_flags = self.type_flags(to);
        if !from_flags.is_reference_type() || !to_flags.is_reference_type() {
            return Ok(false);
        }
        if from_flags.canon_level.is_some() || to_flags.canon_level.is_some() {
            return Ok(true);
        }
        if self.derives_from(from, to)? {
            return Ok(true);
        }
        Ok(self.runtime_interfaces(from)?.contains(&to))
    }

    /// The introduced slot list of a type definition: declared virtuals
    /// that are newslot, or that no base declares a matching virtual for.
    /// Metadata order. Cached per definition.
    fn introduced_virtual_methods(&self, def_ty: TypeId) -> TypeSystemResult<Rc<[MethodDefId]>> {
        if let Some(cached) = self.introduced_cache.borrow().get(&def_ty) {
            return Ok(cached.clone());
        }
        let TypeDesc::Def { module, def } = self.type_desc(def_ty) else {
            unreachable!("introduced slots are a property of definitions");
        };
        let m = self.module(module);
        let base = self.base_type(def_ty)?;
        let mut introduced = Vec::new();
        for &mdef in &m.type_def(def).methods {
            let method = m.method_def(mdef);
            if !method.flags.is_virtual {
                continue;
            }
            let overrides_base = !method.flags.is_newslot
                && match base {
                    Some(base) => self
                        .find_matching_virtual(
                            base,
                            &method.name,
                            method.signature.params.len(),
                            method.flags.generic_arity,
                        )?
                        .is_some(),
                    None => false,
                };
            if !overrides_base {
                introduced.push(mdef);
            }
        }
        let introduced: Rc<[MethodDefId]> = introduced.into();
        self.introduced_cache
            .borrow_mut()
            .insert(def_ty, introduced.clone());
        Ok(introduced)
    }

    /// Search the chain starting at `ty` for a declared virtual matching
    /// name, parameter count and generic arity. Newslot declarations count:
    /// a match means the chain has a slot this signature can bind to.
    fn find_matching_virtual(
        &self,
        ty: TypeId,
        name: &str,
        param_count: usize,
        generic_arity: u32,
    ) -> TypeSystemResult<Option<MethodId>> {
        let mut current = Some(ty);
        while let Some(c) = current {
            let def_ty = self.type_definition(c);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let m = self.module(module);
                for &mdef in &m.type_def(def).methods {
                    let method = m.method_def(mdef);
                    if method.flags.is_virtual
                        && method.name == name
                        && method.signature.params.len() == param_count
                        && method.flags.generic_arity == generic_arity
                    {
                        let ecma = self.ecma_method(module, mdef);
                        return Ok(Some(self.method_on_type(ecma, c)));
                    }
                }
            }
            current = self.base_type(c)?;
        }
        Ok(None)
    }

    /// `EnumAllVirtualSlots`: the ordered slot declarations up through the
    /// type, base introduced lists first. Cached per type.
    pub fn enum_all_virtual_slots(&self, ty: TypeId) -> TypeSystemResult<Rc<[MethodId]>> {
        if let Some(cached) = self.slot_cache.borrow().get(&ty) {
            return Ok(cached.clone());
        }
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(c) = current {
            chain.push(c);
            current = self.base_type(c)?;
        }
        chain.reverse();

        let mut slots = Vec::new();
        for chain_ty in chain {
            let def_ty = self.type_definition(chain_ty);
            let TypeDesc::Def { module, .. } = self.type_desc(def_ty) else {
                continue;
            };
            for &mdef in self.introduced_virtual_methods(def_ty)?.iter() {
                let ecma = self.ecma_method(module, mdef);
                slots.push(self.method_on_type(ecma, chain_ty));
            }
        }
        let slots: Rc<[MethodId]> = slots.into();
        self.slot_cache.borrow_mut().insert(ty, slots.clone());
        Ok(slots)
    }

    /// The resolved implementation for every slot of `enum_all_virtual_slots`,
    /// most-derived-override rule. Cached per type.
    pub fn impl_slots(&self, ty: TypeId) -> TypeSystemResult<Rc<[MethodId]>> {
        if let Some(cached) = self.impl_cache.borrow().get(&ty) {
            return Ok(cached.clone());
        }
        let slots = self.enum_all_virtual_slots(ty)?;
        let mut impls = Vec::with_capacity(slots.len());
        for &decl in slots.iter() {
            impls.push(self.find_override(ty, decl)?);
        }
        let impls: Rc<[MethodId]> = impls.into();
        self.impl_cache.borrow_mut().insert(ty, impls.clone());
        Ok(impls)
    }

    /// The most-derived override of a slot declaration on `object_type`.
    /// Walking down from the most-derived type, the first matching virtual
    /// that does not start a fresh slot wins; the declaration itself is the
    /// fallback at its owning type.
    fn find_override(&self, object_type: TypeId, decl: MethodId) -> TypeSystemResult<MethodId> {
        let decl_name = self.method_name(decl);
        let (decl_module, decl_def) = self.method_ecma(decl);
        let decl_row = self.module(decl_module);
        let decl_row = decl_row.method_def(decl_def);
        let param_count = decl_row.signature.params.len();
        let generic_arity = decl_row.flags.generic_arity;
        let decl_owner = self.method_owner(decl);

        let mut current = Some(object_type);
        while let Some(c) = current {
            let at_decl_owner = c == decl_owner;
            let def_ty = self.type_definition(c);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let m = self.module(module);
                for &mdef in &m.type_def(def).methods {
                    let method = m.method_def(mdef);
                    if method.flags.is_virtual
                        && method.name == decl_name
                        && method.signature.params.len() == param_count
                        && method.flags.generic_arity == generic_arity
                        && (!method.flags.is_newslot || at_decl_owner)
                    {
                        let ecma = self.ecma_method(module, mdef);
                        return Ok(self.method_on_type(ecma, c));
                    }
                }
            }
            if at_decl_owner {
                break;
            }
            current = self.base_type(c)?;
        }
        Ok(decl)
    }

    /// `FindVirtualFunctionTargetMethodOnObjectType`: compile-time vtable
    /// dispatch. `None` when the declaration is not a slot of the object
    /// type. A method instantiation on the declaration is re-applied to the
    /// resolved target.
    pub fn resolve_virtual_slot(
        &self,
        slot_decl: MethodId,
        object_type: TypeId,
    ) -> TypeSystemResult<Option<MethodId>> {
        let bare = self.find_slot_defining_method(slot_decl)?;
        let slots = self.enum_all_virtual_slots(object_type)?;
        let Some(index) = slots.iter().position(|&s| s == bare) else {
            return Ok(None);
        };
        let impls = self.impl_slots(object_type)?;
        let target = impls[index];
        let inst = self.method_instantiation(slot_decl);
        Ok(Some(self.instantiated_method(target, inst)))
    }

    /// `ResolveInterfaceMethodToVirtualMethodOnType`: explicit
    /// method-impl records first (most-derived type wins), then implicit
    /// name-and-arity matching over declared virtuals.
    pub fn resolve_interface_method(
        &self,
        iface_method: MethodId,
        ty: TypeId,
    ) -> TypeSystemResult<Option<MethodId>> {
        if self.type_flags(ty).is_interface {
            return Ok(None);
        }
        let bare = self.uninstantiated_method(iface_method);
        let inst = self.method_instantiation(iface_method);

        // Explicit implementations.
        let mut current = Some(ty);
        while let Some(c) = current {
            let def_ty = self.type_definition(c);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let args = self.type_instantiation(c);
                let m = self.module(module);
                for record in &m.type_def(def).method_impls {
                    let Ok(decl) = self.resolve_method_expr(&record.decl, module, &args, &[])
                    else {
                        continue;
                    };
                    if self.uninstantiated_method(decl) != bare {
                        continue;
                    }
                    for &mdef in &m.type_def(def).methods {
                        if m.method_def(mdef).name == record.body {
                            let ecma = self.ecma_method(module, mdef);
                            let body = self.method_on_type(ecma, c);
                            return Ok(Some(self.instantiated_method(body, inst)));
                        }
                    }
                }
            }
            current = self.base_type(c)?;
        }

        // Implicit implementations: name, arity, and the resolved signature
        // must match exactly. Signature exactness is what lets the variant
        // form below distinguish IFoo<Base> from IFoo<Derived>.
        let name = self.method_name(bare);
        let (decl_module, decl_def) = self.method_ecma(bare);
        let decl_row = self.module(decl_module);
        let decl_row = decl_row.method_def(decl_def);
        let param_count = decl_row.signature.params.len();
        let generic_arity = decl_row.flags.generic_arity;
        let want_sig = self.method_signature(bare)?;

        let mut current = Some(ty);
        while let Some(c) = current {
            let def_ty = self.type_definition(c);
            if let TypeDesc::Def { module, def } = self.type_desc(def_ty) {
                let m = self.module(module);
                for &mdef in &m.type_def(def).methods {
                    let method = m.method_def(mdef);
                    if !method.flags.is_virtual
                        || method.name != name
                        || method.signature.params.len() != param_count
                        || method.flags.generic_arity != generic_arity
                    {
                        continue;
                    }
                    let ecma = self.ecma_method(module, mdef);
                    let candidate = self.method_on_type(ecma, c);
                    if let Ok(sig) = self.method_signature(candidate)
                        && sig == want_sig
                    {
                        return Ok(Some(self.instantiated_method(candidate, inst)));
                    }
                }
            }
            current = self.base_type(c)?;
        }
        Ok(None)
    }

    /// `FindSlotDefiningMethodForVirtualMethod`: walk up from a virtual
    /// method to the ancestor declaration that introduced its slot.
    pub fn find_slot_defining_method(&self, m: MethodId) -> TypeSystemResult<MethodId> {
        let mut slot = self.uninstantiated_method(m);
        loop {
            if self.method_flags(slot).is_newslot {
                return Ok(slot);
            }
            let owner = self.method_owner(slot);
            let Some(base) = self.base_type(owner)? else {
                return Ok(slot);
            };
            let (module, def) = self.method_ecma(slot);
            let row = self.module(module);
            let row = row.method_def(def);
            match self.find_matching_virtual(
                base,
                &row.name,
                row.signature.params.len(),
                row.flags.generic_arity,
            )? {
                Some(above) => slot = above,
                None => return Ok(slot),
            }
        }
    }

    /// Variant-aware interface resolution: when the exact interface is not
    /// implemented, try implemented interfaces of the same definition whose
    /// arguments are variance-compatible with the requested ones.
    pub fn resolve_interface_method_variant(
        &self,
        iface_method: MethodId,
        ty: TypeId,
    ) -> TypeSystemResult<Option<MethodId>> {
        if let Some(target) = self.resolve_interface_method(iface_method, ty)? {
            return Ok(Some(target));
        }
        let iface = self.method_owner(self.uninstantiated_method(iface_method));
        let iface_def = self.type_definition(iface);
        let want_args = self.type_instantiation(iface);
        if want_args.is_empty() {
            return Ok(None);
        }
        for &candidate in self.runtime_interfaces(ty)?.iter() {
            if candidate == iface || self.type_definition(candidate) != iface_def {
                continue;
            }
            let have_args = self.type_instantiation(candidate);
            if !self.variance_compatible(iface_def, &have_args, &want_args)? {
                continue;
            }
            let (module, def) = self.method_ecma(iface_method);
            let ecma = self.ecma_method(module, def);
            let on_candidate = self.method_on_type(ecma, candidate);
            let with_inst =
                self.instantiated_method(on_candidate, self.method_instantiation(iface_method));
            if let Some(target) = self.resolve_interface_method(with_inst, ty)? {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    fn variance_compatible(
        &self,
        iface_def: TypeId,
        have_args: &[TypeId],
        want_args: &[TypeId],
    ) -> TypeSystemResult<bool> {
        let TypeDesc::Def { module, def } = self.type_desc(iface_def) else {
            return Ok(false);
        };
        let m = self.module(module);
        let params = &m.type_def(def).generic_params;
        if params.len() != have_args.len() || have_args.len() != want_args.len() {
            return Ok(false);
        }
        for ((&have, &want), param) in have_args.iter().zip(want_args.iter()).zip(params.iter()) {
            let ok = match param.variance {
                Variance::Invariant => have == want,
                Variance::Covariant => self.is_assignable_ref(have, want)?,
                Variance::Contravariant => self.is_assignable_ref(want, have)?,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The static constructor of a type, if declared.
    pub fn static_constructor(&self, ty: TypeId) -> Option<MethodId> {
        let def_ty = self.type_definition(ty);
        let TypeDesc::Def { module, def } = self.type_desc(def_ty) else {
            return None;
        };
        let m = self.module(module);
        for &mdef in &m.type_def(def).methods {
            let method = m.method_def(mdef);
            if method.name == ".cctor" && method.flags.is_static {
                let ecma = self.ecma_method(module, mdef);
                return Some(self.method_on_type(ecma, ty));
            }
        }
        None
    }
}
