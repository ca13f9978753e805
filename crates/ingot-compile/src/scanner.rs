// scanner.rs
//
// The scanner pass: marks the graph to fixed point with the lightweight
// body importer and condenses the marked set into the immutable oracles
// the compiler consumes.

use rustc_hash::{FxHashMap, FxHashSet};

use ingot_graph::{DependencyGraph, NodeId};
use ingot_identity::{MethodId, TypeId};
use ingot_types::{ModuleGroup, TypeSystemContext};

use crate::config::{CompilationMode, CompilerConfig};
use crate::error::CompileResult;
use crate::factory::CompileEnv;
use crate::key::NodeKey;
use crate::metadata::MetadataManager;
use crate::oracles::ScanResults;
use crate::provider::CompilationProvider;
use crate::roots::{RootProvider, Rooter};

/// Run the scanner over the given roots and produce [`ScanResults`].
#[tracing::instrument(skip_all)]
pub fn scan(
    ctx: &TypeSystemContext,
    group: &dyn ModuleGroup,
    config: &CompilerConfig,
    metadata: &dyn MetadataManager,
    roots: &[&dyn RootProvider],
) -> CompileResult<ScanResults> {
    let env = CompileEnv {
        ctx,
        group,
        config,
        metadata,
        mode: CompilationMode::Scanning,
    };
    let mut provider = CompilationProvider::new(env);
    let mut graph = DependencyGraph::new(config.tracking);
    let mut exports = Vec::new();

    {
        let mut rooter = Rooter {
            factory: &mut provider.factory,
            env: &provider.env,
            graph: &mut graph,
            filter: None,
            exports: &mut exports,
        };
        for provider_ in roots {
            provider_.add_compilation_roots(&mut rooter);
        }
    }

    graph.compute_marked_nodes(&mut provider);
    tracing::info!(
        marked = graph.marked_nodes().len(),
        "scan reached fixed point"
    );

    Ok(build_results(ctx, &provider, &graph))
}

fn build_results(
    ctx: &TypeSystemContext,
    provider: &CompilationProvider,
    graph: &DependencyGraph,
) -> ScanResults {
    let mut results = ScanResults::default();
    // Used virtual slots grouped by the slot-defining owner type.
    let mut used_slots: FxHashMap<TypeId, FxHashSet<MethodId>> = FxHashMap::default();

    for &node in graph.marked_nodes() {
        match provider.factory.key(node) {
            NodeKey::MethodEntrypoint(m) | NodeKey::CanonicalEntrypoint(m) => {
                results.compiled_methods.insert(m);
            }
            NodeKey::ConstructedType(t) => {
                results.constructed_types.insert(t);
                results.invokable_types.insert(t);
                record_unsealed_bases(ctx, &mut results, t);
            }
            NodeKey::VirtualMethodUse(decl) => {
                let owner = ctx.method_owner(decl);
                used_slots.entry(owner).or_default().insert(decl);
            }
            NodeKey::GvmDependencies(decl) => {
                let bare = ctx.uninstantiated_method(decl);
                let owner = ctx.method_owner(bare);
                used_slots.entry(owner).or_default().insert(bare);
            }
            NodeKey::TypeMetadata(t) => {
                results.types_with_metadata.insert(t);
            }
            NodeKey::MethodMetadata(m) => {
                results.methods_with_metadata.insert(m);
            }
            NodeKey::ReflectableType(t) => {
                results.invokable_types.insert(t);
            }
            NodeKey::ReflectableMethod(m) => {
                results.invokable_methods.insert(m);
            }
            _ => {}
        }
    }

    // Order used slots by the owner's slot list so the compiler sees a
    // stable layout.
    for (owner, used) in used_slots {
        match ctx.enum_all_virtual_slots(owner) {
            Ok(slots) => {
                let ordered: Vec<MethodId> = slots
                    .iter()
                    .copied()
                    .filter(|decl| used.contains(decl))
                    .collect();
                results.vtable_layouts.insert(owner, ordered);
            }
            Err(e) => {
                tracing::warn!(
                    owner = %ctx.type_name(owner),
                    error = %e,
                    "vtable layout dropped"
                );
            }
        }
    }

    if let Some(scan) = &provider.scan {
        results.dictionary_layouts = scan.layout_snapshot();
    }

    results
}

fn record_unsealed_bases(ctx: &TypeSystemContext, results: &mut ScanResults, t: TypeId) {
    let mut current = match ctx.base_type(t) {
        Ok(base) => base,
        Err(_) => None,
    };
    while let Some(base) = current {
        results.unsealed_types.insert(base);
        current = match ctx.base_type(base) {
            Ok(next) => next,
            Err(_) => None,
        };
    }
}

/// Dump the marked set with one first-edge chain per node; the debugging
/// view behind the graph's dependency tracking level.
pub fn dump_marked(
    ctx: &TypeSystemContext,
    provider: &CompilationProvider,
    graph: &DependencyGraph,
) -> Vec<String> {
    graph
        .marked_nodes()
        .iter()
        .map(|&node| {
            let chain: Vec<String> = graph
                .first_dependency_chain(node)
                .iter()
                .map(|&(n, reason): &(NodeId, &str)| {
                    format!("{} [{}]", provider.factory.node_name(ctx, n), reason)
                })
                .collect();
            chain.join(" -> ")
        })
        .collect()
}
