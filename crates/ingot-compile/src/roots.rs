// roots.rs
//
// Compilation roots: the seeds the graph grows from. Rooting failures are
// local: a type or method that does not resolve is logged and skipped, and
// the rest of the module still roots.

use std::rc::Rc;

use ingot_graph::{DependencyGraph, NodeId};
use ingot_identity::{FieldId, MethodId, ModuleId, TypeId};
use ingot_types::{CanonKind, TypeIdVec};

use crate::factory::{CompileEnv, NodeFactory};
use crate::key::{HelperId, HelperTarget};
use crate::oracles::ScanResults;

/// Seeds the graph through a [`Rooter`].
pub trait RootProvider {
    fn add_compilation_roots(&self, rooter: &mut Rooter);
}

/// The rooting service handed to providers: named root adders plus the
/// scan filter used by [`FilteredRootProvider`].
pub struct Rooter<'r, 'e> {
    pub(crate) factory: &'r mut NodeFactory,
    pub(crate) env: &'r CompileEnv<'e>,
    pub(crate) graph: &'r mut DependencyGraph,
    pub(crate) filter: Option<Rc<ScanResults>>,
    pub(crate) exports: &'r mut Vec<(NodeId, String)>,
}

impl Rooter<'_, '_> {
    pub fn add_method_root(
        &mut self,
        method: MethodId,
        reason: &'static str,
        export_name: Option<&str>,
    ) {
        let ctx = self.env.ctx;
        if let Some(filter) = self.filter.as_deref() {
            let canonical = ctx.canonical_method_target(method, CanonKind::Specific);
            if !filter.was_compiled(method) && !filter.was_compiled(canonical) {
                return;
            }
        }
        // A method whose signature does not resolve cannot be rooted; the
        // failure stays local to this one entity.
        if let Err(e) = ctx.method_signature(method) {
            tracing::warn!(
                method = %ctx.method_display(method),
                error = %e,
                "skipping unrootable method"
            );
            return;
        }
        let node = self.factory.method_entrypoint(self.env, method);
        self.graph.add_root(node, reason);
        if let Some(name) = export_name {
            self.exports.push((node, name.to_string()));
        }
    }

    pub fn add_type_root(&mut self, ty: TypeId, reason: &'static str) {
        if let Some(filter) = self.filter.as_deref()
            && !filter.is_constructed(ty)
        {
            return;
        }
        let node = self.factory.constructed_type_symbol(self.env, ty);
        self.graph.add_root(node, reason);
    }

    // Specialised reflection roots.

    pub fn add_reflection_type_root(&mut self, ty: TypeId, reason: &'static str) {
        let node = self.factory.reflectable_type(ty);
        self.graph.add_root(node, reason);
    }

    pub fn add_reflection_method_root(&mut self, method: MethodId, reason: &'static str) {
        let node = self.factory.reflectable_method(method);
        self.graph.add_root(node, reason);
    }

    pub fn add_static_base_root(&mut self, ty: TypeId, reason: &'static str) {
        let node = self
            .factory
            .ready_to_run_helper(HelperId::GetStaticBase, HelperTarget::Type(ty));
        self.graph.add_root(node, reason);
    }

    pub fn add_thread_static_base_root(&mut self, ty: TypeId, reason: &'static str) {
        let node = self
            .factory
            .ready_to_run_helper(HelperId::GetThreadStaticBase, HelperTarget::Type(ty));
        self.graph.add_root(node, reason);
    }

    pub fn add_module_metadata_root(&mut self, module: ModuleId, reason: &'static str) {
        let node = self.factory.module_metadata(module);
        self.graph.add_root(node, reason);
    }

    pub fn add_readonly_blob_root(&mut self, field: FieldId, reason: &'static str) {
        let node = self.factory.field_rva_data(field);
        self.graph.add_root(node, reason);
    }

    /// Delegate marshalling keeps the delegate type constructible.
    pub fn add_delegate_marshalling_root(&mut self, ty: TypeId, reason: &'static str) {
        self.add_type_root(ty, reason);
    }

    /// Struct marshalling needs the layout but no construction.
    pub fn add_struct_marshalling_root(&mut self, ty: TypeId, reason: &'static str) {
        let node = self.factory.necessary_type_symbol(self.env, ty);
        self.graph.add_root(node, reason);
    }
}

/// Root exactly one method; the debugging workhorse.
pub struct SingleMethodRoot {
    method: MethodId,
}

impl SingleMethodRoot {
    pub fn new(method: MethodId) -> Self {
        Self { method }
    }
}

impl RootProvider for SingleMethodRoot {
    fn add_compilation_roots(&self, rooter: &mut Rooter) {
        rooter.add_method_root(self.method, "single method root", None);
    }
}

/// Root a module's entry point, exported as `main`.
pub struct ModuleEntrypointRoot {
    module: ModuleId,
}

impl ModuleEntrypointRoot {
    pub fn new(module: ModuleId) -> Self {
        Self { module }
    }
}

impl RootProvider for ModuleEntrypointRoot {
    fn add_compilation_roots(&self, rooter: &mut Rooter) {
        let ctx = rooter.env.ctx;
        let ecma_module = ctx.module(self.module);
        let Some(entry) = ecma_module.entry_point.clone() else {
            tracing::warn!(module = %ecma_module.name, "module has no entry point");
            return;
        };
        match ctx.resolve_method_expr(&entry, self.module, &[], &[]) {
            Ok(method) => {
                rooter.add_method_root(method, "module entry point", Some("main"));
                rooter.add_module_metadata_root(self.module, "entry module metadata");
            }
            Err(e) => {
                tracing::warn!(module = %ecma_module.name, error = %e, "entry point did not resolve");
            }
        }
    }
}

/// Root every reachable method of the given modules, the way a library
/// image is built. Generic definitions are rooted at their canonical
/// instantiation when canonical rooting is enabled, and skipped otherwise
/// (they are then reached only through use sites).
pub struct LibraryRoot {
    modules: Vec<ModuleId>,
}

impl LibraryRoot {
    pub fn new(modules: Vec<ModuleId>) -> Self {
        Self { modules }
    }
}

impl RootProvider for LibraryRoot {
    fn add_compilation_roots(&self, rooter: &mut Rooter) {
        for &module in &self.modules {
            let ctx = rooter.env.ctx;
            let ecma_module = ctx.module(module);
            for (def_id, type_def) in ecma_module.type_defs() {
                let def_ty = ctx.def_type(module, def_id);
                if type_def.generic_params.is_empty() {
                    if !type_def.is_abstract && type_def.kind != ingot_types::TypeDefKind::Interface
                    {
                        rooter.add_type_root(def_ty, "library root");
                    }
                    for method in ctx.methods_of(def_ty) {
                        let flags = ctx.method_flags(method);
                        if flags.is_abstract {
                            continue;
                        }
                        if flags.generic_arity > 0 {
                            // Generic methods root at their canonical
                            // instantiation, and only when enabled.
                            if !rooter.env.config.root_canonical_code {
                                continue;
                            }
                            let canon = ctx.well_known().canon;
                            let margs: TypeIdVec =
                                (0..flags.generic_arity).map(|_| canon).collect();
                            let method = ctx.instantiated_method(method, margs);
                            rooter.add_method_root(method, "library root (canonical)", None);
                            continue;
                        }
                        rooter.add_method_root(method, "library root", None);
                    }
                    continue;
                }

                if !rooter.env.config.root_canonical_code {
                    continue;
                }
                let canon = ctx.well_known().canon;
                let args: TypeIdVec = type_def.generic_params.iter().map(|_| canon).collect();
                let inst = ctx.instantiated_type(def_ty, args);
                rooter.add_type_root(inst, "library root (canonical)");
                for method in ctx.methods_of(inst) {
                    let flags = ctx.method_flags(method);
                    if flags.is_abstract {
                        continue;
                    }
                    let method = if flags.generic_arity > 0 {
                        let margs: TypeIdVec =
                            (0..flags.generic_arity).map(|_| canon).collect();
                        ctx.instantiated_method(method, margs)
                    } else {
                        method
                    };
                    rooter.add_method_root(method, "library root (canonical)", None);
                }
            }
            rooter.add_module_metadata_root(module, "library module metadata");
        }
    }
}

/// Wraps another provider and admits only entities the scanner proved
/// live.
pub struct FilteredRootProvider<'a> {
    inner: &'a dyn RootProvider,
    results: Rc<ScanResults>,
}

impl<'a> FilteredRootProvider<'a> {
    pub fn new(inner: &'a dyn RootProvider, results: Rc<ScanResults>) -> Self {
        Self { inner, results }
    }
}

impl RootProvider for FilteredRootProvider<'_> {
    fn add_compilation_roots(&self, rooter: &mut Rooter) {
        let previous = rooter.filter.take();
        rooter.filter = Some(self.results.clone());
        self.inner.add_compilation_roots(rooter);
        rooter.filter = previous;
    }
}
