// oracles.rs
//
// The bridge between the passes: everything the scanner learned, frozen
// into an immutable snapshot the compiler consults. The compiler's demands
// must stay inside what is recorded here; anything else is a scanner
// failure.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use ingot_identity::{MethodId, TypeId};
use ingot_types::{CanonKind, ModuleGroup, TypeDesc, TypeSystemContext};

use crate::key::DictionaryEntry;

/// Ordered dictionary slots of one generic context.
#[derive(Debug, Clone, Default)]
pub struct DictionaryLayout {
    entries: Vec<DictionaryEntry>,
}

impl DictionaryLayout {
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn slot_of(&self, entry: &DictionaryEntry) -> Option<usize> {
        self.entries.iter().position(|e| e == entry)
    }

    pub fn contains(&self, entry: &DictionaryEntry) -> bool {
        self.slot_of(entry).is_some()
    }
}

/// Mutable scan-side state: dictionary layouts under construction. Interior
/// mutability because entries are appended from inside dependency
/// computation.
#[derive(Debug, Default)]
pub struct ScanRecorder {
    layouts: RefCell<FxHashMap<MethodId, DictionaryLayout>>,
    sealed: RefCell<FxHashSet<MethodId>>,
}

impl ScanRecorder {
    pub fn append_entry(&self, context: MethodId, entry: DictionaryEntry) {
        let mut layouts = self.layouts.borrow_mut();
        let layout = layouts.entry(context).or_default();
        if !layout.contains(&entry) {
            layout.entries.push(entry);
        }
    }

    /// Mark a canonical body's layout as complete; dictionary nodes for its
    /// instantiations defer until this.
    pub fn seal(&self, context: MethodId) {
        self.sealed.borrow_mut().insert(context);
    }

    pub fn is_sealed(&self, context: MethodId) -> bool {
        self.sealed.borrow().contains(&context)
    }

    pub fn layout(&self, context: MethodId) -> DictionaryLayout {
        self.layouts
            .borrow()
            .get(&context)
            .cloned()
            .unwrap_or_default()
    }

    pub fn layout_snapshot(&self) -> FxHashMap<MethodId, DictionaryLayout> {
        self.layouts.borrow().clone()
    }
}

/// A type's vtable slice as the scanner saw it.
#[derive(Debug, Clone, Copy)]
pub enum VTableLayout<'a> {
    /// Exactly these slot declarations were used, in slot order.
    Exact(&'a [MethodId]),
    /// Outside the local scope: layout is resolved lazily, no validation.
    Lazy,
}

/// Immutable scan output: entity sets plus the four oracles (vtable slices,
/// dictionary layouts, sealing, inlining).
#[derive(Debug, Default)]
pub struct ScanResults {
    pub(crate) compiled_methods: FxHashSet<MethodId>,
    pub(crate) constructed_types: FxHashSet<TypeId>,
    /// Types that are the base of some constructed type.
    pub(crate) unsealed_types: FxHashSet<TypeId>,
    /// Used slot declarations, keyed by the slot-defining owner type,
    /// in slot order.
    pub(crate) vtable_layouts: FxHashMap<TypeId, Vec<MethodId>>,
    pub(crate) dictionary_layouts: FxHashMap<MethodId, DictionaryLayout>,
    pub(crate) methods_with_metadata: FxHashSet<MethodId>,
    pub(crate) invokable_methods: FxHashSet<MethodId>,
    pub(crate) types_with_metadata: FxHashSet<TypeId>,
    pub(crate) invokable_types: FxHashSet<TypeId>,
}

impl ScanResults {
    pub fn compiled_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.compiled_methods.iter().copied()
    }

    /// Whether the scanner predicted a body for this method (queried with
    /// the canonical target for shared code).
    pub fn was_compiled(&self, method: MethodId) -> bool {
        self.compiled_methods.contains(&method)
    }

    pub fn is_constructed(&self, ty: TypeId) -> bool {
        self.constructed_types.contains(&ty)
    }

    pub fn methods_with_metadata(&self) -> &FxHashSet<MethodId> {
        &self.methods_with_metadata
    }

    pub fn invokable_methods(&self) -> &FxHashSet<MethodId> {
        &self.invokable_methods
    }

    pub fn types_with_metadata(&self) -> &FxHashSet<TypeId> {
        &self.types_with_metadata
    }

    pub fn invokable_types(&self) -> &FxHashSet<TypeId> {
        &self.invokable_types
    }

    /// Devirtualisation oracle. A type with no constructed subtypes is
    /// effectively sealed; virtual calls through it can be made direct.
    pub fn is_effectively_sealed(&self, ctx: &TypeSystemContext, ty: TypeId) -> bool {
        let flags = ctx.type_flags(ty);
        if flags.is_interface {
            return false;
        }
        let def_ty = ctx.type_definition(ty);
        if let TypeDesc::Def { module, def } = ctx.type_desc(def_ty) {
            let m = ctx.module(module);
            let td = m.type_def(def);
            if td.is_abstract {
                return false;
            }
            if td.is_sealed {
                return true;
            }
        }
        !self.unsealed_types.contains(&ty)
    }

    /// Vtable slice oracle, keyed by the slot-defining owner type.
    pub fn vtable_layout(
        &self,
        ctx: &TypeSystemContext,
        group: &dyn ModuleGroup,
        owner: TypeId,
    ) -> VTableLayout<'_> {
        if !group.contains_type(ctx, owner) {
            return VTableLayout::Lazy;
        }
        match self.vtable_layouts.get(&owner) {
            Some(slots) => VTableLayout::Exact(slots),
            None => VTableLayout::Exact(&[]),
        }
    }

    /// Whether a slot use on a local owner was recorded by the scanner.
    pub fn slot_used(
        &self,
        ctx: &TypeSystemContext,
        group: &dyn ModuleGroup,
        owner: TypeId,
        decl: MethodId,
    ) -> bool {
        match self.vtable_layout(ctx, group, owner) {
            VTableLayout::Lazy => true,
            VTableLayout::Exact(slots) => slots.contains(&decl),
        }
    }

    pub fn dictionary_layout(&self, context: MethodId) -> Option<&DictionaryLayout> {
        self.dictionary_layouts.get(&context)
    }

    /// Inlining oracle: the callee must version with the compilation, and
    /// its owner must be constructed unless the callee is static or on a
    /// value type.
    pub fn can_inline(
        &self,
        ctx: &TypeSystemContext,
        group: &dyn ModuleGroup,
        _caller: MethodId,
        callee: MethodId,
    ) -> bool {
        if !group.versions_with_method_body(ctx, callee) {
            return false;
        }
        let flags = ctx.method_flags(callee);
        if flags.is_static {
            return true;
        }
        let owner = ctx.method_owner(callee);
        if ctx.type_flags(owner).is_value_type {
            return true;
        }
        let canonical_owner = ctx.convert_to_canon_form(owner, CanonKind::Specific);
        self.constructed_types.contains(&owner) || self.constructed_types.contains(&canonical_owner)
    }
}
