// tests.rs

use rustc_hash::FxHashMap;

use super::*;

/// Toy provider: a fixed table of nodes with scripted edges.
#[derive(Default)]
struct TableProvider {
    static_deps: FxHashMap<NodeId, Vec<Edge>>,
    conditional_deps: FxHashMap<NodeId, Vec<ConditionalEdge>>,
    dynamic_nodes: Vec<NodeId>,
    /// Dynamic rule: when `observed` turns up marked, emit `emit`.
    dynamic_rules: Vec<(NodeId, NodeId)>,
    dependency_calls: FxHashMap<NodeId, usize>,
}

impl TableProvider {
    fn edge(&mut self, from: u32, to: u32, reason: &'static str) {
        self.static_deps
            .entry(NodeId::new(from))
            .or_default()
            .push(Edge::new(NodeId::new(to), reason));
    }

    fn conditional(&mut self, declaring: u32, trigger: u32, target: u32) {
        self.conditional_deps
            .entry(NodeId::new(declaring))
            .or_default()
            .push(ConditionalEdge {
                trigger: NodeId::new(trigger),
                target: NodeId::new(target),
                reason: "conditional",
            });
    }
}

impl NodeProvider for TableProvider {
    fn node_name(&self, node: NodeId) -> String {
        format!("node{}", node.index())
    }

    fn node_dependencies(&mut self, node: NodeId) -> NodeDependencies {
        *self.dependency_calls.entry(node).or_insert(0) += 1;
        NodeDependencies {
            static_deps: self.static_deps.get(&node).cloned().unwrap_or_default(),
            conditional_deps: self
                .conditional_deps
                .get(&node)
                .cloned()
                .unwrap_or_default(),
            has_dynamic_deps: self.dynamic_nodes.contains(&node),
        }
    }

    fn search_dynamic_dependencies(
        &mut self,
        _node: NodeId,
        marked: &[NodeId],
        first_new: usize,
    ) -> Vec<Edge> {
        let mut out = Vec::new();
        for &new_node in &marked[first_new..] {
            for &(observed, emit) in &self.dynamic_rules {
                if observed == new_node {
                    out.push(Edge::new(emit, "dynamic"));
                }
            }
        }
        out
    }
}

#[test]
fn test_static_closure() {
    let mut provider = TableProvider::default();
    provider.edge(0, 1, "a");
    provider.edge(1, 2, "b");
    provider.edge(2, 0, "cycle");

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);

    let marked: Vec<u32> = graph.marked_nodes().iter().map(|n| n.index()).collect();
    assert_eq!(marked, vec![0, 1, 2]);
    // Unreached nodes stay unmarked.
    assert!(!graph.is_marked(NodeId::new(7)));
}

#[test]
fn test_dependencies_computed_once_per_node() {
    let mut provider = TableProvider::default();
    provider.edge(0, 1, "a");
    provider.edge(0, 2, "a");
    provider.edge(1, 2, "b");
    provider.edge(2, 1, "c");

    let mut graph = DependencyGraph::new(TrackingLevel::None);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);

    for node in [0, 1, 2] {
        assert_eq!(provider.dependency_calls[&NodeId::new(node)], 1);
    }
}

#[test]
fn test_conditional_edge_requires_both_endpoints() {
    // Node 0 declares "3 if 2". Without 2 marked, 3 stays out.
    let mut provider = TableProvider::default();
    provider.conditional(0, 2, 3);

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);
    assert!(!graph.is_marked(NodeId::new(3)));

    // With the trigger reachable, the conditional target is marked.
    let mut provider = TableProvider::default();
    provider.conditional(0, 2, 3);
    provider.edge(0, 2, "to-trigger");

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);
    assert!(graph.is_marked(NodeId::new(3)));
}

#[test]
fn test_conditional_edge_trigger_marked_first() {
    // Trigger is marked before the declaring node is processed.
    let mut provider = TableProvider::default();
    provider.edge(0, 2, "to-trigger");
    provider.edge(0, 1, "to-declaring");
    provider.conditional(1, 2, 3);

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);
    assert!(graph.is_marked(NodeId::new(3)));
}

#[test]
fn test_dynamic_dependencies_follow_growth() {
    // Node 0 is dynamic: whenever node 2 is marked, it demands node 3.
    // Node 1 brings 2 in only after 0's static pass already ran.
    let mut provider = TableProvider::default();
    provider.dynamic_nodes.push(NodeId::new(0));
    provider.dynamic_rules.push((NodeId::new(2), NodeId::new(3)));
    provider.edge(0, 1, "a");
    provider.edge(1, 2, "b");

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);
    assert!(graph.is_marked(NodeId::new(3)));
}

#[test]
fn test_marking_is_monotone_and_deterministic() {
    let build = || {
        let mut provider = TableProvider::default();
        provider.edge(0, 5, "a");
        provider.edge(0, 3, "a");
        provider.edge(3, 5, "b");
        provider.edge(5, 9, "c");
        let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
        graph.add_root(NodeId::new(0), "root");
        graph.compute_marked_nodes(&mut provider);
        graph.marked_nodes().to_vec()
    };
    let first = build();
    let second = build();
    assert_eq!(first, second);
    // Discovery order: roots first, then breadth-first frontier.
    let order: Vec<u32> = first.iter().map(|n| n.index()).collect();
    assert_eq!(order, vec![0, 5, 3, 9]);
}

#[test]
fn test_first_dependency_chain() {
    let mut provider = TableProvider::default();
    provider.edge(0, 1, "uses");
    provider.edge(1, 2, "calls");

    let mut graph = DependencyGraph::new(TrackingLevel::FirstEdge);
    graph.add_root(NodeId::new(0), "root");
    graph.compute_marked_nodes(&mut provider);

    let chain = graph.first_dependency_chain(NodeId::new(2));
    let nodes: Vec<u32> = chain.iter().map(|(n, _)| n.index()).collect();
    assert_eq!(nodes, vec![0, 1, 2]);
    assert_eq!(chain[0].1, "root");
    assert_eq!(chain[2].1, "calls");
}
