// nodes.rs
//
// Dependency computation per node family. The factory picked the key; this
// is where each key's semantics live: what a constructed type implies, how
// shared code splits into canonical body + shadow + dictionary, which edges
// are conditional on a virtual slot actually being used.
//
// Type-system failures inside one node's computation degrade that node
// (throwing or empty stub, a warning on the log) and never abort the pass.

use rustc_hash::FxHashMap;

use ingot_graph::NodeId;
use ingot_identity::MethodId;
use ingot_types::{CanonKind, MethodDesc, TypeDesc, TypeSystemContext, TypeSystemResult};

use crate::backend::{CodegenBackend, MethodCode, Relocation};
use crate::config::CompilationMode;
use crate::ilscan;
use crate::intrinsics::{method_intrinsic_support, IntrinsicSupport};
use crate::key::{DictionaryEntry, HelperId, HelperTarget, NodeKey};
use crate::metadata::EntityRef;
use crate::provider::DependencyCollector;

/// Compute a node's dependencies. Returns whether the node produces
/// dynamic dependencies.
pub(crate) fn compute_dependencies(
    col: &mut DependencyCollector,
    backend: Option<&mut dyn CodegenBackend>,
    code: &mut FxHashMap<MethodId, MethodCode>,
    key: NodeKey,
) -> bool {
    match key {
        NodeKey::MethodEntrypoint(m) => {
            method_body_dependencies(col, backend, code, m, false);
            false
        }
        NodeKey::CanonicalEntrypoint(m) => {
            method_body_dependencies(col, backend, code, m, true);
            false
        }
        NodeKey::ShadowConcreteMethod(m) => {
            let canonical = col.factory.canonical_entrypoint(col.env, m);
            col.depend(canonical, "canonical body");
            let dictionary = col.factory.generic_dictionary(m);
            col.depend(dictionary, "generic dictionary");
            false
        }
        NodeKey::GenericDictionary(m) => {
            generic_dictionary_dependencies(col, m);
            false
        }
        NodeKey::ConstructedType(t) => {
            constructed_type_dependencies(col, t);
            false
        }
        NodeKey::NecessaryType(t) | NodeKey::CanonicalType(t) => {
            type_composition_dependencies(col, t);
            false
        }
        NodeKey::VTable(t) => {
            vtable_dependencies(col, t);
            false
        }
        NodeKey::InterfaceDispatchMap(t) => {
            let ctx = col.env.ctx;
            let node = col.factory.necessary_type_symbol(col.env, t);
            col.depend(node, "dispatch map owner");
            match ctx.runtime_interfaces(t) {
                Ok(ifaces) => {
                    for &iface in ifaces.iter() {
                        let node = col.factory.necessary_type_symbol(col.env, iface);
                        col.depend(node, "dispatched interface");
                    }
                }
                Err(e) => degrade(ctx, "interface dispatch map", &e.to_string()),
            }
            false
        }
        NodeKey::VirtualMethodUse(decl) => {
            let ctx = col.env.ctx;
            let owner = ctx.method_owner(decl);
            let node = col.factory.necessary_type_symbol(col.env, owner);
            col.depend(node, "virtual slot owner");
            if col.env.mode == CompilationMode::Compiling
                && let Some(oracles) = col.oracles
                && !oracles.slot_used(ctx, col.env.group, owner, decl)
            {
                col.fail_scanner(format!(
                    "virtual slot '{}' was not in the scanned vtable layout of '{}'",
                    ctx.method_display(decl),
                    ctx.type_name(owner)
                ));
            }
            false
        }
        NodeKey::GvmDependencies(decl) => {
            let ctx = col.env.ctx;
            let owner = ctx.method_owner(ctx.uninstantiated_method(decl));
            let node = col.factory.necessary_type_symbol(col.env, owner);
            col.depend(node, "generic virtual slot owner");
            true
        }
        NodeKey::ReadyToRunHelper(id, target) => {
            helper_dependencies(col, id, target);
            false
        }
        NodeKey::ReflectableType(t) => {
            let ctx = col.env.ctx;
            let category = col.env.metadata.metadata_category(ctx, EntityRef::Type(t));
            if category.description {
                let node = col.factory.type_metadata(t);
                col.depend(node, "type description");
            }
            if category.runtime_mapping {
                let node = col.factory.necessary_type_symbol(col.env, t);
                col.depend(node, "type runtime mapping");
            }
            reflectability_edges(col, EntityRef::Type(t));
            false
        }
        NodeKey::ReflectableMethod(m) => {
            let ctx = col.env.ctx;
            let category = col.env.metadata.metadata_category(ctx, EntityRef::Method(m));
            if category.description {
                let node = col.factory.method_metadata(m);
                col.depend(node, "method description");
            }
            // Open generic definitions have no invokable entrypoint; their
            // instantiations carry their own nodes.
            let open_generic = ctx.method_flags(m).generic_arity > 0
                && ctx.method_instantiation(m).is_empty();
            if category.runtime_mapping
                && !open_generic
                && let Some(stub) = col.env.metadata.canonical_reflection_invoke_stub(ctx, m)
            {
                let node = col.factory.method_entrypoint(col.env, stub);
                col.depend(node, "reflection invoke stub");
            }
            reflectability_edges(col, EntityRef::Method(m));
            false
        }
        NodeKey::TypeMetadata(t) => {
            let ctx = col.env.ctx;
            let node = col.factory.module_metadata(ctx.defining_module(t));
            col.depend(node, "owning module metadata");
            if let Ok(Some(base)) = ctx.base_type(t) {
                let node = col.factory.type_metadata(base);
                col.depend(node, "base type metadata");
            }
            false
        }
        NodeKey::MethodMetadata(m) => {
            let owner = col.env.ctx.method_owner(m);
            let node = col.factory.type_metadata(owner);
            col.depend(node, "owning type metadata");
            false
        }
        NodeKey::FieldMetadata(f) => {
            let owner = col.env.ctx.field_owner(f);
            let node = col.factory.type_metadata(owner);
            col.depend(node, "owning type metadata");
            false
        }
        // Leaves: symbols resolved elsewhere, data already validated.
        NodeKey::ExternMethod(_)
        | NodeKey::ExternalType(_)
        | NodeKey::StringLiteral(_)
        | NodeKey::FieldRvaData(_)
        | NodeKey::ModuleMetadata(_) => false,
    }
}

fn degrade(ctx: &TypeSystemContext, what: &str, detail: &str) {
    let _ = ctx;
    tracing::warn!(node = what, error = detail, "dependency computation degraded");
}

// ============================================================================
// Method bodies
// ============================================================================

fn method_body_dependencies(
    col: &mut DependencyCollector,
    backend: Option<&mut dyn CodegenBackend>,
    code: &mut FxHashMap<MethodId, MethodCode>,
    m: MethodId,
    canonical: bool,
) {
    match col.env.mode {
        CompilationMode::Scanning => scanned_method_dependencies(col, m, canonical),
        CompilationMode::Compiling => compiled_method_dependencies(col, backend, code, m),
    }
}

fn scanned_method_dependencies(col: &mut DependencyCollector, m: MethodId, canonical: bool) {
    let ctx = col.env.ctx;

    if let MethodDesc::Stub { target, .. } = ctx.method_desc(m) {
        let node = col.factory.method_entrypoint(col.env, target);
        col.depend(node, "unboxing stub target");
        if canonical && let Some(scan) = col.scan {
            scan.seal(m);
        }
        return;
    }

    let checkpoint = col.edge_count();
    if let Err(e) = ilscan::record_body_dependencies(col, m) {
        tracing::warn!(
            method = %ctx.method_display(m),
            error = %e,
            "body analysis failed; substituting throwing stub"
        );
        col.truncate_edges(checkpoint);
    }
    if canonical && let Some(scan) = col.scan {
        scan.seal(m);
    }

    let definition = ctx.method_definition(m);
    if !col
        .env
        .metadata
        .metadata_category(ctx, EntityRef::Method(definition))
        .is_none()
    {
        col.env.metadata.note_reflectable(EntityRef::Method(definition));
        let node = col.factory.reflectable_method(definition);
        col.depend(node, "reflectable method");
    }
}

fn compiled_method_dependencies(
    col: &mut DependencyCollector,
    backend: Option<&mut dyn CodegenBackend>,
    code: &mut FxHashMap<MethodId, MethodCode>,
    m: MethodId,
) {
    let ctx = col.env.ctx;

    // The compiler's live set must stay inside the scanner's closure.
    if let Some(oracles) = col.oracles
        && !oracles.was_compiled(m)
    {
        col.fail_scanner(format!(
            "method '{}' reached the compiler but was never scanned",
            ctx.method_display(m)
        ));
        return;
    }

    if col.env.config.verbose {
        tracing::info!(method = %ctx.method_display(m), "compiling");
    }

    if let MethodDesc::Stub { target, .. } = ctx.method_desc(m) {
        let node = col.factory.method_entrypoint(col.env, target);
        col.depend(node, "unboxing stub target");
        // A jump thunk: unbox `this`, tail-call the target.
        code.insert(
            m,
            MethodCode {
                bytes: vec![0x48, 0x8d, 0x49, 0x08, 0xe9, 0, 0, 0, 0],
                relocs: vec![Relocation {
                    offset: 5,
                    target: node,
                }],
                frame: Default::default(),
                gc_info: Vec::new(),
            },
        );
        return;
    }

    let owner_generic = !ctx.type_instantiation(ctx.method_owner(m)).is_empty();
    let generic = owner_generic || !ctx.method_instantiation(m).is_empty();
    if col.env.config.no_generic_code && generic {
        tracing::debug!(method = %ctx.method_display(m), "generic code disabled");
        return;
    }
    if col.env.config.only_canonical_code && generic && !ctx.is_canonical_method(m) {
        tracing::debug!(method = %ctx.method_display(m), "non-canonical instantiation skipped");
        return;
    }

    if method_intrinsic_support(ctx, m) == Some(IntrinsicSupport::Unknown) {
        tracing::warn!(
            method = %ctx.method_display(m),
            "unmodelled hardware intrinsic; left for runtime JIT"
        );
        return;
    }

    if let Some(backend) = backend {
        let checkpoint = col.edge_count();
        match backend.compile_method(m, col) {
            Ok(compiled) => {
                code.insert(m, compiled);
            }
            Err(e) => {
                tracing::warn!(
                    method = %ctx.method_display(m),
                    error = %e,
                    "not pre-compiled; left for runtime JIT"
                );
                col.truncate_edges(checkpoint);
            }
        }
    }

    // Reflectability holds whether or not the body pre-compiled.
    let definition = ctx.method_definition(m);
    if !col
        .env
        .metadata
        .metadata_category(ctx, EntityRef::Method(definition))
        .is_none()
    {
        let node = col.factory.reflectable_method(definition);
        col.depend(node, "reflectable method");
    }
}

// ============================================================================
// Generic dictionaries
// ============================================================================

fn type_depth(ctx: &TypeSystemContext, t: ingot_identity::TypeId) -> u32 {
    match ctx.type_desc(t) {
        TypeDesc::Instantiated { args, .. } => {
            1 + args.iter().map(|&a| type_depth(ctx, a)).max().unwrap_or(0)
        }
        TypeDesc::Array { element, .. } | TypeDesc::ByRef(element) | TypeDesc::Pointer(element) => {
            1 + type_depth(ctx, element)
        }
        _ => 1,
    }
}

fn instantiation_depth(ctx: &TypeSystemContext, m: MethodId) -> u32 {
    let owner_args = ctx.type_instantiation(ctx.method_owner(m));
    let method_args = ctx.method_instantiation(m);
    owner_args
        .iter()
        .chain(method_args.iter())
        .map(|&a| type_depth(ctx, a))
        .max()
        .unwrap_or(0)
}

fn generic_dictionary_dependencies(col: &mut DependencyCollector, m: MethodId) {
    let ctx = col.env.ctx;
    let canonical = ctx.canonical_method_target(m, CanonKind::Specific);
    let owner_args = ctx.type_instantiation(ctx.method_owner(m));
    let method_args = ctx.method_instantiation(m);

    let layout = match col.env.mode {
        CompilationMode::Scanning => col
            .scan
            .map(|scan| scan.layout(canonical))
            .unwrap_or_default(),
        CompilationMode::Compiling => col
            .oracles
            .and_then(|o| o.dictionary_layout(canonical))
            .cloned()
            .unwrap_or_default(),
    };

    for entry in layout.entries() {
        match *entry {
            DictionaryEntry::TypeHandle(open) => {
                let ty = ctx.instantiate_type(open, &owner_args, &method_args);
                let node = col.factory.necessary_type_symbol(col.env, ty);
                col.depend(node, "dictionary type handle");
            }
            DictionaryEntry::MethodHandle(open) => {
                let target = ctx.instantiate_method(open, &owner_args, &method_args);
                let node = col.factory.method_metadata(target);
                col.depend(node, "dictionary method handle");
            }
            DictionaryEntry::FieldHandle(open) => {
                let target = ctx.instantiate_field(open, &owner_args, &method_args);
                let node = col.factory.field_metadata(target);
                col.depend(node, "dictionary field handle");
            }
            DictionaryEntry::MethodEntrypoint(open) => {
                let target = ctx.instantiate_method(open, &owner_args, &method_args);
                if instantiation_depth(ctx, target) > col.env.config.generic_depth_cutoff {
                    // Recursive generic expansion: past the cutoff only the
                    // shared body is demanded and the concrete dictionary
                    // cell falls back to a runtime lookup.
                    tracing::warn!(
                        method = %ctx.method_display(target),
                        "generic recursion cutoff reached; using runtime lookup"
                    );
                    let node = col.factory.canonical_entrypoint(col.env, target);
                    col.depend(node, "generic recursion cutoff");
                } else {
                    let node = col.factory.method_entrypoint(col.env, target);
                    col.depend(node, "dictionary call stub");
                }
            }
        }
    }
}

// ============================================================================
// Type nodes
// ============================================================================

fn method_or_unboxing(col: &mut DependencyCollector, target: MethodId) -> NodeId {
    let ctx = col.env.ctx;
    let owner = ctx.method_owner(target);
    if ctx.type_flags(owner).is_value_type && !ctx.method_flags(target).is_static {
        col.factory.unboxing_thunk(col.env, target)
    } else {
        col.factory.method_entrypoint(col.env, target)
    }
}

fn constructed_type_dependencies(col: &mut DependencyCollector, t: ingot_identity::TypeId) {
    let ctx = col.env.ctx;
    let node = col.factory.necessary_type_symbol(col.env, t);
    col.depend(node, "type descriptor");

    let result: TypeSystemResult<()> = (|| {
        if let Some(base) = ctx.base_type(t)? {
            let node = col.factory.constructed_type_symbol(col.env, base);
            col.depend(node, "base type");
        }
        for &iface in ctx.runtime_interfaces(t)?.iter() {
            let node = col.factory.constructed_type_symbol(col.env, iface);
            col.depend(node, "implemented interface");
        }

        if let TypeDesc::Array { element, .. } = ctx.type_desc(t) {
            let node = col.factory.necessary_type_symbol(col.env, element);
            col.depend(node, "array element");
            return Ok(());
        }

        let vtable = col.factory.vtable(t);
        col.depend(vtable, "vtable");

        let flags = ctx.type_flags(t);
        let ifaces = ctx.runtime_interfaces(t)?;
        if !flags.is_interface && !ifaces.is_empty() {
            let node = col.factory.interface_dispatch_map(t);
            col.depend(node, "interface dispatch map");
        }

        if !flags.is_interface {
            // Class virtuals: the override is live once anything calls
            // through the slot and this type is constructed.
            let slots = ctx.enum_all_virtual_slots(t)?;
            let impls = ctx.impl_slots(t)?;
            for (&decl, &target) in slots.iter().zip(impls.iter()) {
                if ctx.method_flags(target).is_abstract
                    || ctx.method_flags(decl).generic_arity > 0
                {
                    continue;
                }
                let trigger = col.factory.virtual_method_use(col.env, decl)?;
                let target_node = method_or_unboxing(col, target);
                col.depend_conditional(trigger, target_node, "virtual override");
            }

            // Interface slots likewise; generic interface methods are
            // covered by the dynamic dispatch node instead.
            for &iface in ifaces.iter() {
                for decl in ctx.methods_of(iface) {
                    let decl_flags = ctx.method_flags(decl);
                    if !decl_flags.is_virtual || decl_flags.generic_arity > 0 {
                        continue;
                    }
                    let Some(target) = ctx.resolve_interface_method_variant(decl, t)? else {
                        continue;
                    };
                    if ctx.method_flags(target).is_abstract {
                        continue;
                    }
                    let trigger = col.factory.virtual_method_use(col.env, decl)?;
                    let target_node = method_or_unboxing(col, target);
                    col.depend_conditional(trigger, target_node, "interface implementation");
                }
            }
        }
        Ok(())
    })();
    if let Err(e) = result {
        degrade(ctx, "constructed type", &e.to_string());
    }

    if !col
        .env
        .metadata
        .metadata_category(ctx, EntityRef::Type(t))
        .is_none()
    {
        col.env.metadata.note_reflectable(EntityRef::Type(t));
        let node = col.factory.reflectable_type(t);
        col.depend(node, "reflectable type");
    }
}

fn type_composition_dependencies(col: &mut DependencyCollector, t: ingot_identity::TypeId) {
    let ctx = col.env.ctx;
    match ctx.type_desc(t) {
        TypeDesc::Instantiated { def, args } => {
            let node = col.factory.necessary_type_symbol(col.env, def);
            col.depend(node, "generic definition");
            for &arg in &args {
                let node = col.factory.necessary_type_symbol(col.env, arg);
                col.depend(node, "instantiation argument");
            }
        }
        TypeDesc::Array { element, .. } | TypeDesc::ByRef(element) | TypeDesc::Pointer(element) => {
            let node = col.factory.necessary_type_symbol(col.env, element);
            col.depend(node, "element type");
        }
        TypeDesc::FunctionPointer(sig) => {
            let sig = ctx.signature(sig);
            for &ty in sig.params.iter().chain(std::iter::once(&sig.ret)) {
                let node = col.factory.necessary_type_symbol(col.env, ty);
                col.depend(node, "signature type");
            }
        }
        TypeDesc::Def { .. } | TypeDesc::GenericParam { .. } => {}
    }
}

fn vtable_dependencies(col: &mut DependencyCollector, t: ingot_identity::TypeId) {
    // During the scan the vtable is a lazy slice: slots accrete through
    // VirtualMethodUse marks. The compile pass materialises exactly the
    // slots the scanner recorded.
    if col.env.mode == CompilationMode::Scanning {
        return;
    }
    let ctx = col.env.ctx;
    let Some(oracles) = col.oracles else {
        return;
    };
    let result: TypeSystemResult<()> = (|| {
        let slots = ctx.enum_all_virtual_slots(t)?;
        let impls = ctx.impl_slots(t)?;
        for (&decl, &target) in slots.iter().zip(impls.iter()) {
            let owner = ctx.method_owner(decl);
            if !oracles.slot_used(ctx, col.env.group, owner, decl) {
                continue;
            }
            if ctx.method_flags(target).is_abstract {
                continue;
            }
            let node = method_or_unboxing(col, target);
            col.depend(node, "vtable slot");
        }
        Ok(())
    })();
    if let Err(e) = result {
        degrade(ctx, "vtable", &e.to_string());
    }
}

// ============================================================================
// Helpers, reflection, dynamic dispatch
// ============================================================================

fn helper_dependencies(col: &mut DependencyCollector, id: HelperId, target: HelperTarget) {
    let ctx = col.env.ctx;
    match (id, target) {
        (HelperId::New, HelperTarget::Type(t))
        | (HelperId::NewArr, HelperTarget::Type(t))
        | (HelperId::Box, HelperTarget::Type(t)) => {
            let node = col.factory.constructed_type_symbol(col.env, t);
            col.depend(node, "instance type");
        }
        (HelperId::Unbox, HelperTarget::Type(t))
        | (HelperId::CastClass, HelperTarget::Type(t))
        | (HelperId::IsInstanceOf, HelperTarget::Type(t)) => {
            let node = col.factory.necessary_type_symbol(col.env, t);
            col.depend(node, "cast target");
        }
        (HelperId::TypeHandle, HelperTarget::Type(t)) => {
            let node = col.factory.necessary_type_symbol(col.env, t);
            col.depend(node, "type token");
            if !col
                .env
                .metadata
                .metadata_category(ctx, EntityRef::Type(t))
                .is_none()
            {
                col.env.metadata.note_reflectable(EntityRef::Type(t));
                let node = col.factory.reflectable_type(t);
                col.depend(node, "reflectable token");
            }
        }
        (HelperId::MethodHandle, HelperTarget::Method(m)) => {
            let definition = ctx.method_definition(m);
            if !col
                .env
                .metadata
                .metadata_category(ctx, EntityRef::Method(definition))
                .is_none()
            {
                col.env.metadata.note_reflectable(EntityRef::Method(definition));
                let node = col.factory.reflectable_method(definition);
                col.depend(node, "reflectable token");
            }
            let node = col.factory.method_metadata(m);
            col.depend(node, "method token");
        }
        (HelperId::FieldHandle, HelperTarget::Field(f)) => {
            let node = col.factory.field_metadata(f);
            col.depend(node, "field token");
        }
        (HelperId::GetStaticBase, HelperTarget::Type(t))
        | (HelperId::GetThreadStaticBase, HelperTarget::Type(t)) => {
            let node = col.factory.necessary_type_symbol(col.env, t);
            col.depend(node, "statics owner");
            if let Some(cctor) = ctx.static_constructor(t) {
                let node = col.factory.method_entrypoint(col.env, cctor);
                col.depend(node, "static constructor");
            }
        }
        _ => {
            tracing::warn!(helper = ?id, "helper with mismatched target");
        }
    }
}

fn reflectability_edges(col: &mut DependencyCollector, entity: EntityRef) {
    let mut extra = Vec::new();
    col.env
        .metadata
        .dependencies_due_to_reflectability(col.env, col.factory, entity, &mut extra);
    for edge in extra {
        col.depend(edge.target, edge.reason);
    }
}

/// Dynamic dependencies of a generic virtual method: every constructed type
/// that resolves the declaration contributes its instantiated override.
pub(crate) fn search_generic_virtual_dispatch(
    col: &mut DependencyCollector,
    decl: MethodId,
    marked: &[NodeId],
    first_new: usize,
) {
    let ctx = col.env.ctx;
    let owner = ctx.method_owner(ctx.uninstantiated_method(decl));
    let owner_is_interface = ctx.type_flags(owner).is_interface;
    let owner_def = ctx.type_definition(owner);

    for &node in &marked[first_new..] {
        let NodeKey::ConstructedType(s) = col.factory.key(node) else {
            continue;
        };
        let resolved: TypeSystemResult<Option<MethodId>> = if owner_is_interface {
            ctx.runtime_interfaces(s).and_then(|ifaces| {
                if ifaces.iter().any(|&i| ctx.type_definition(i) == owner_def) {
                    ctx.resolve_interface_method_variant(decl, s)
                } else {
                    Ok(None)
                }
            })
        } else {
            ctx.resolve_virtual_slot(decl, s)
        };
        match resolved {
            Ok(Some(target)) if !ctx.method_flags(target).is_abstract => {
                let node = col.factory.method_entrypoint(col.env, target);
                col.depend(node, "generic virtual dispatch");
            }
            Ok(_) => {}
            Err(e) => degrade(ctx, "generic virtual dispatch", &e.to_string()),
        }
    }
}
