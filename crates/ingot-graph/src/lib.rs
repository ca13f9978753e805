//! Demand-driven dependency graph, marked to fixed point.
//!
//! The engine is generic over a [`NodeProvider`], which owns node identity
//! and dependency computation (in the compiler this is the node factory).
//! Nodes are addressed by dense [`NodeId`]s; the provider may create new
//! nodes while the engine iterates, so the id space grows during marking.
//!
//! Three edge kinds drive the closure:
//! - static edges always fire once the source is marked;
//! - conditional edges `(trigger, target)` fire when both the declaring
//!   node and the trigger are marked;
//! - dynamic producers are re-queried against the growing marked list until
//!   a full wave adds nothing.
//!
//! Marking is monotonic, order-deterministic, and terminates because the
//! provider's key space is finite for any finite closure of roots.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

/// Dense node identity allocated by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// A dependency edge with its human-readable reason.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub target: NodeId,
    pub reason: &'static str,
}

impl Edge {
    pub fn new(target: NodeId, reason: &'static str) -> Self {
        Self { target, reason }
    }
}

/// A conditional edge declared by a node: `target` is marked once both the
/// declaring node and `trigger` are marked.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalEdge {
    pub trigger: NodeId,
    pub target: NodeId,
    pub reason: &'static str,
}

/// Everything a node reports about its outgoing edges.
#[derive(Debug, Default)]
pub struct NodeDependencies {
    pub static_deps: Vec<Edge>,
    pub conditional_deps: Vec<ConditionalEdge>,
    /// Register this node as a dynamic producer, re-queried every wave.
    pub has_dynamic_deps: bool,
}

/// Node identity, naming and dependency computation, supplied by the owner
/// of the node space.
pub trait NodeProvider {
    /// Diagnostic name for a node.
    fn node_name(&self, node: NodeId) -> String;

    /// Whether the node's static dependencies can be computed yet. The
    /// engine defers nodes that answer `false` and retries after the rest
    /// of the frontier has been processed.
    fn static_dependencies_computed(&mut self, node: NodeId) -> bool {
        let _ = node;
        true
    }

    /// Compute the node's dependencies. Called exactly once per marked
    /// node, after `static_dependencies_computed` reports true.
    fn node_dependencies(&mut self, node: NodeId) -> NodeDependencies;

    /// Re-query a dynamic producer. `marked` is the monotone marked list;
    /// `first_new` indexes the first node the producer has not seen yet.
    fn search_dynamic_dependencies(
        &mut self,
        node: NodeId,
        marked: &[NodeId],
        first_new: usize,
    ) -> Vec<Edge>;
}

/// How much edge provenance the graph retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingLevel {
    /// Keep nothing beyond the marked set.
    None,
    /// Keep the first inbound edge per node, enough to reconstruct one
    /// root-to-node chain.
    #[default]
    FirstEdge,
    /// Keep every inbound edge.
    All,
}

#[derive(Debug, Clone, Copy)]
struct Provenance {
    source: Option<NodeId>,
    reason: &'static str,
}

struct DynamicProducer {
    node: NodeId,
    seen: usize,
}

/// The marking engine. One instance per pass; the marked list survives the
/// computation for the emitter.
pub struct DependencyGraph {
    tracking: TrackingLevel,
    roots: Vec<(NodeId, &'static str)>,
    marked: Vec<NodeId>,
    is_marked: Vec<bool>,
    queue: VecDeque<NodeId>,
    deferred: VecDeque<NodeId>,
    pending_conditional: FxHashMap<NodeId, Vec<(NodeId, NodeId, &'static str)>>,
    dynamic: Vec<DynamicProducer>,
    first_edge: FxHashMap<NodeId, Provenance>,
    all_edges: FxHashMap<NodeId, Vec<Provenance>>,
    computed: bool,
}

impl DependencyGraph {
    pub fn new(tracking: TrackingLevel) -> Self {
        Self {
            tracking,
            roots: Vec::new(),
            marked: Vec::new(),
            is_marked: Vec::new(),
            queue: VecDeque::new(),
            deferred: VecDeque::new(),
            pending_conditional: FxHashMap::default(),
            dynamic: Vec::new(),
            first_edge: FxHashMap::default(),
            all_edges: FxHashMap::default(),
            computed: false,
        }
    }

    /// Seed the graph. Roots are marked unconditionally when the
    /// computation starts.
    pub fn add_root(&mut self, node: NodeId, reason: &'static str) {
        self.roots.push((node, reason));
    }

    pub fn is_marked(&self, node: NodeId) -> bool {
        self.is_marked
            .get(node.index() as usize)
            .copied()
            .unwrap_or(false)
    }

    /// The ordered, monotone marked list.
    pub fn marked_nodes(&self) -> &[NodeId] {
        &self.marked
    }

    fn mark(&mut self, node: NodeId, source: Option<NodeId>, reason: &'static str) {
        let index = node.index() as usize;
        if index >= self.is_marked.len() {
            self.is_marked.resize(index + 1, false);
        }
        match self.tracking {
            TrackingLevel::None => {}
            TrackingLevel::FirstEdge => {
                self.first_edge
                    .entry(node)
                    .or_insert(Provenance { source, reason });
            }
            TrackingLevel::All => {
                self.first_edge
                    .entry(node)
                    .or_insert(Provenance { source, reason });
                self.all_edges
                    .entry(node)
                    .or_default()
                    .push(Provenance { source, reason });
            }
        }
        if self.is_marked[index] {
            return;
        }
        self.is_marked[index] = true;
        self.marked.push(node);
        self.queue.push_back(node);

        // A fresh mark may complete conditional edges waiting on it.
        if let Some(pending) = self.pending_conditional.remove(&node) {
            for (target, declaring, edge_reason) in pending {
                self.mark(target, Some(declaring), edge_reason);
            }
        }
    }

    /// Run the work queue to fixed point. Idempotent per instance.
    pub fn compute_marked_nodes<P: NodeProvider>(&mut self, provider: &mut P) {
        if self.computed {
            return;
        }
        self.computed = true;

        for (node, reason) in std::mem::take(&mut self.roots) {
            self.mark(node, None, reason);
        }

        loop {
            let mut progressed = false;

            while let Some(node) = self.next_ready(provider) {
                progressed = true;
                let deps = provider.node_dependencies(node);
                for edge in deps.static_deps {
                    self.mark(edge.target, Some(node), edge.reason);
                }
                for cond in deps.conditional_deps {
                    if self.is_marked(cond.trigger) {
                        self.mark(cond.target, Some(node), cond.reason);
                    } else {
                        self.pending_conditional
                            .entry(cond.trigger)
                            .or_default()
                            .push((cond.target, node, cond.reason));
                    }
                }
                if deps.has_dynamic_deps {
                    self.dynamic.push(DynamicProducer { node, seen: 0 });
                }
            }

            // Dynamic wave: every producer sees the part of the marked list
            // that is new to it.
            for index in 0..self.dynamic.len() {
                let (node, seen) = {
                    let producer = &self.dynamic[index];
                    (producer.node, producer.seen)
                };
                if seen >= self.marked.len() {
                    continue;
                }
                // The high-water mark is taken before the search runs, so
                // nodes the search itself marks are replayed next wave.
                let high_water = self.marked.len();
                let edges = provider.search_dynamic_dependencies(node, &self.marked, seen);
                self.dynamic[index].seen = high_water;
                for edge in edges {
                    self.mark(edge.target, Some(node), edge.reason);
                }
                progressed = true;
            }

            if self.queue.is_empty() && self.deferred.is_empty() && !progressed {
                break;
            }
            if self.queue.is_empty() && self.deferred.is_empty() {
                // One more wave to let dynamic producers quiesce.
                if self.dynamic.iter().all(|p| p.seen >= self.marked.len()) {
                    break;
                }
            }
        }

        tracing::debug!(marked = self.marked.len(), "dependency graph fixed point");
    }

    /// Pop the next processable node, deferring nodes whose static
    /// dependencies are not computable yet. A deferred node is forced once
    /// only deferred nodes remain and nothing else can make progress.
    fn next_ready<P: NodeProvider>(&mut self, provider: &mut P) -> Option<NodeId> {
        let mut deferred_this_round = 0;
        loop {
            if let Some(node) = self.queue.pop_front() {
                if provider.static_dependencies_computed(node) {
                    return Some(node);
                }
                self.deferred.push_back(node);
                continue;
            }
            if self.deferred.is_empty() {
                return None;
            }
            // Requeue deferred nodes; if a full cycle defers everything
            // again, force the oldest to break the stalemate.
            if deferred_this_round >= self.deferred.len() {
                return self.deferred.pop_front();
            }
            deferred_this_round = self.deferred.len();
            self.queue.extend(self.deferred.drain(..));
        }
    }

    /// Reconstruct a root-to-node chain of `(node, reason)` pairs from the
    /// first-edge provenance. With tracking `None` only the node itself is
    /// returned.
    pub fn first_dependency_chain(&self, node: NodeId) -> Vec<(NodeId, &'static str)> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(c) = current {
            match self.first_edge.get(&c) {
                Some(provenance) => {
                    chain.push((c, provenance.reason));
                    current = provenance.source;
                }
                None => {
                    chain.push((c, "unknown"));
                    current = None;
                }
            }
        }
        chain.reverse();
        chain
    }

    /// Every recorded inbound edge of a node (tracking level `All`).
    pub fn inbound_edges(&self, node: NodeId) -> Vec<(Option<NodeId>, &'static str)> {
        self.all_edges
            .get(&node)
            .map(|edges| edges.iter().map(|p| (p.source, p.reason)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
