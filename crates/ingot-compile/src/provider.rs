// provider.rs
//
// Glue between the generic graph engine and the node factory: dependency
// computation for a node dispatches on its key, collecting edges through a
// DependencyCollector that can intern new nodes while the engine iterates.

use rustc_hash::FxHashMap;

use ingot_graph::{ConditionalEdge, Edge, NodeDependencies, NodeId, NodeProvider};
use ingot_identity::MethodId;
use ingot_types::CanonKind;

use crate::backend::{CodegenBackend, MethodCode};
use crate::config::CompilationMode;
use crate::factory::{CompileEnv, NodeFactory};
use crate::key::{DictionaryEntry, NodeKey};
use crate::nodes;
use crate::oracles::{ScanRecorder, ScanResults};

/// Edge sink handed to dependency computation and to the backend. Interns
/// node keys through the factory and records the edges that marked the
/// current node's dependencies.
pub struct DependencyCollector<'c, 'e> {
    pub factory: &'c mut NodeFactory,
    pub env: &'c CompileEnv<'e>,
    pub scan: Option<&'c ScanRecorder>,
    pub oracles: Option<&'e ScanResults>,
    edges: Vec<Edge>,
    conditional: Vec<ConditionalEdge>,
    failure: Option<String>,
}

impl<'c, 'e> DependencyCollector<'c, 'e> {
    pub fn new(
        factory: &'c mut NodeFactory,
        env: &'c CompileEnv<'e>,
        scan: Option<&'c ScanRecorder>,
        oracles: Option<&'e ScanResults>,
    ) -> Self {
        Self {
            factory,
            env,
            scan,
            oracles,
            edges: Vec::new(),
            conditional: Vec::new(),
            failure: None,
        }
    }

    pub fn depend(&mut self, node: NodeId, reason: &'static str) {
        self.edges.push(Edge::new(node, reason));
    }

    pub fn depend_conditional(&mut self, trigger: NodeId, target: NodeId, reason: &'static str) {
        self.conditional.push(ConditionalEdge {
            trigger,
            target,
            reason,
        });
    }

    /// A generic-context lookup. During the scan the entry is appended to
    /// the context's layout; during compilation it must already be there.
    pub fn record_dictionary_entry(&mut self, context: MethodId, entry: DictionaryEntry) {
        match self.env.mode {
            CompilationMode::Scanning => {
                if let Some(scan) = self.scan {
                    scan.append_entry(context, entry);
                }
            }
            CompilationMode::Compiling => {
                let known = self
                    .oracles
                    .and_then(|o| o.dictionary_layout(context))
                    .is_some_and(|layout| layout.contains(&entry));
                if !known {
                    self.fail_scanner(format!(
                        "dictionary entry missing from scanned layout of '{}'",
                        self.env.ctx.method_display(context)
                    ));
                }
            }
        }
    }

    pub fn fail_scanner(&mut self, detail: String) {
        if self.failure.is_none() {
            self.failure = Some(detail);
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges recorded since a checkpoint; backends use this to build
    /// relocations against the nodes each instruction referenced.
    pub fn edges_since(&self, checkpoint: usize) -> &[Edge] {
        &self.edges[checkpoint..]
    }

    /// Discard edges recorded past a checkpoint. Used when a body analysis
    /// fails and the node degrades to a throwing or empty stub.
    pub fn truncate_edges(&mut self, checkpoint: usize) {
        self.edges.truncate(checkpoint);
    }

    fn finish(self, has_dynamic: bool) -> (NodeDependencies, Option<String>) {
        (
            NodeDependencies {
                static_deps: self.edges,
                conditional_deps: self.conditional,
                has_dynamic_deps: has_dynamic,
            },
            self.failure,
        )
    }
}

/// The provider wired into the graph engine for one pass.
pub struct CompilationProvider<'e> {
    pub factory: NodeFactory,
    pub env: CompileEnv<'e>,
    /// Scan pass only.
    pub scan: Option<ScanRecorder>,
    /// Compile pass only.
    pub oracles: Option<&'e ScanResults>,
    pub backend: Option<&'e mut dyn CodegenBackend>,
    /// Compiled bodies, keyed by method.
    pub code: FxHashMap<MethodId, MethodCode>,
    /// First scanner-consistency violation, with the offending node.
    pub failure: Option<(NodeId, String)>,
}

impl<'e> CompilationProvider<'e> {
    pub fn new(env: CompileEnv<'e>) -> Self {
        let mode = env.mode;
        Self {
            factory: NodeFactory::new(mode),
            env,
            scan: match mode {
                CompilationMode::Scanning => Some(ScanRecorder::default()),
                CompilationMode::Compiling => None,
            },
            oracles: None,
            backend: None,
            code: FxHashMap::default(),
            failure: None,
        }
    }
}

impl NodeProvider for CompilationProvider<'_> {
    fn node_name(&self, node: NodeId) -> String {
        self.factory.node_name(self.env.ctx, node)
    }

    fn static_dependencies_computed(&mut self, node: NodeId) -> bool {
        // Dictionary nodes wait for the canonical body scan that fills
        // their layout. Compile-pass layouts are frozen oracles.
        if self.env.mode == CompilationMode::Scanning
            && let NodeKey::GenericDictionary(m) = self.factory.key(node)
            && let Some(scan) = &self.scan
        {
            let canonical = self.env.ctx.canonical_method_target(m, CanonKind::Specific);
            return scan.is_sealed(canonical);
        }
        true
    }

    fn node_dependencies(&mut self, node: NodeId) -> NodeDependencies {
        let key = self.factory.key(node);
        let mut collector = DependencyCollector::new(
            &mut self.factory,
            &self.env,
            self.scan.as_ref(),
            self.oracles,
        );
        let has_dynamic = nodes::compute_dependencies(
            &mut collector,
            match &mut self.backend {
                Some(b) => Some(&mut **b),
                None => None,
            },
            &mut self.code,
            key,
        );
        let (deps, failure) = collector.finish(has_dynamic);
        if let Some(detail) = failure
            && self.failure.is_none()
        {
            self.failure = Some((node, detail));
        }
        deps
    }

    fn search_dynamic_dependencies(
        &mut self,
        node: NodeId,
        marked: &[NodeId],
        first_new: usize,
    ) -> Vec<Edge> {
        let key = self.factory.key(node);
        let NodeKey::GvmDependencies(decl) = key else {
            return Vec::new();
        };
        let mut collector = DependencyCollector::new(
            &mut self.factory,
            &self.env,
            self.scan.as_ref(),
            self.oracles,
        );
        nodes::search_generic_virtual_dispatch(&mut collector, decl, marked, first_new);
        let (deps, failure) = collector.finish(false);
        if let Some(detail) = failure
            && self.failure.is_none()
        {
            self.failure = Some((node, detail));
        }
        deps.static_deps
    }
}
