use crate::metrics;
use crate::model::{
    Edge, EdgeKind, FunctionTrace, Symbol, TraceDirection, TraceEdge, TraceNode,
};
use std::collections::{HashMap, HashSet, VecDeque};

/// In-memory adjacency over `call` edges.
#[derive(Debug, Default, Clone)]
pub struct CallGraph {
    outgoing: HashMap<i64, Vec<i64>>,
    incoming: HashMap<i64, Vec<i64>>,
}

impl CallGraph {
    pub fn from_edges(edges: &[Edge]) -> Self {
        let mut graph = CallGraph::default();
        for edge in edges.iter().filter(|edge| edge.kind == EdgeKind::Call) {
            graph.add(edge.source_id, edge.target_id);
        }
        graph
    }

    pub fn add(&mut self, source: i64, target: i64) {
        self.outgoing.entry(source).or_default().push(target);
        self.incoming.entry(target).or_default().push(source);
    }

    pub fn callees(&self, id: i64) -> &[i64] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn callers(&self, id: i64) -> &[i64] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct transitive callers of `id` within `depth` hops.
    pub fn blast_radius(&self, id: i64, depth: usize) -> usize {
        let reached = bfs(id, Some(depth), |node| self.callers(node));
        reached.len() - 1
    }
}

/// Breadth-first walk returning each reached node with its distance,
/// start included at distance 0.
fn bfs<'g, F>(start: i64, depth: Option<usize>, neighbors: F) -> Vec<(i64, usize)>
where
    F: Fn(i64) -> &'g [i64],
{
    let mut visited: HashSet<i64> = HashSet::new();
    let mut queue: VecDeque<(i64, usize)> = VecDeque::new();
    let mut order = Vec::new();
    visited.insert(start);
    queue.push_back((start, 0));
    while let Some((id, dist)) = queue.pop_front() {
        order.push((id, dist));
        if depth.is_some_and(|cap| dist >= cap) {
            continue;
        }
        for &next in neighbors(id) {
            if visited.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
    order
}

/// Callers and callees around `root`. Depth is negative upstream.
///
/// `symbols` must contain every symbol the walk can reach; ids missing
/// from it are left out of the trace.
pub fn function_trace(
    graph: &CallGraph,
    root: i64,
    symbols: &HashMap<i64, Symbol>,
    downstream_depth: usize,
    upstream_depth: Option<usize>,
) -> FunctionTrace {
    let mut trace = FunctionTrace::default();
    if !symbols.contains_key(&root) {
        return trace;
    }
    let mut seen_nodes: HashSet<i64> = HashSet::new();
    let mut seen_edges: HashSet<(i64, i64)> = HashSet::new();

    let mut push_node = |trace: &mut FunctionTrace, id: i64, depth: i64, direction| {
        if !seen_nodes.insert(id) {
            return;
        }
        if let Some(symbol) = symbols.get(&id) {
            trace.nodes.push(TraceNode {
                id,
                name: symbol.name.clone(),
                kind: symbol.kind,
                file_path: symbol.file_path.clone(),
                depth,
                direction,
                is_sink: metrics::is_sink(&symbol.name, &symbol.file_path),
            });
        }
    };

    push_node(&mut trace, root, 0, TraceDirection::Root);

    let downstream = bfs(root, Some(downstream_depth), |id| graph.callees(id));
    let reached_down: HashSet<i64> = downstream.iter().map(|(id, _)| *id).collect();
    for &(id, dist) in downstream.iter().skip(1) {
        push_node(&mut trace, id, dist as i64, TraceDirection::Downstream);
    }
    for &(id, dist) in &downstream {
        if dist >= downstream_depth {
            continue;
        }
        for &callee in graph.callees(id) {
            if reached_down.contains(&callee) && seen_edges.insert((id, callee)) {
                trace.edges.push(TraceEdge {
                    source: id,
                    target: callee,
                    kind: EdgeKind::Call,
                });
            }
        }
    }

    let upstream = bfs(root, upstream_depth, |id| graph.callers(id));
    let reached_up: HashSet<i64> = upstream.iter().map(|(id, _)| *id).collect();
    for &(id, dist) in upstream.iter().skip(1) {
        push_node(&mut trace, id, -(dist as i64), TraceDirection::Upstream);
    }
    for &(id, dist) in &upstream {
        if upstream_depth.is_some_and(|cap| dist >= cap) {
            continue;
        }
        for &caller in graph.callers(id) {
            if reached_up.contains(&caller) && seen_edges.insert((caller, id)) {
                trace.edges.push(TraceEdge {
                    source: caller,
                    target: id,
                    kind: EdgeKind::Call,
                });
            }
        }
    }

    trace.edges.retain(|edge| seen_nodes.contains(&edge.source) && seen_nodes.contains(&edge.target));
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolKind;

    fn graph(edges: &[(i64, i64)]) -> CallGraph {
        let mut graph = CallGraph::default();
        for &(source, target) in edges {
            graph.add(source, target);
        }
        graph
    }

    fn symbols(names: &[(i64, &str)]) -> HashMap<i64, Symbol> {
        names
            .iter()
            .map(|&(id, name)| {
                (
                    id,
                    Symbol {
                        id,
                        name: name.to_string(),
                        kind: SymbolKind::Function,
                        file_path: "/repo/src/app.ts".into(),
                        start_line: id,
                        start_col: 1,
                        end_line: id,
                        end_col: 1,
                        complexity: 1,
                        domain: None,
                        risk_score: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn blast_radius_terminates_on_cycles() {
        let graph = graph(&[(1, 2), (2, 1)]);
        assert_eq!(graph.blast_radius(1, 5), 1);
        assert_eq!(graph.blast_radius(2, 5), 1);
    }

    #[test]
    fn blast_radius_respects_depth_cap() {
        // 6 -> 5 -> 4 -> 3 -> 2 -> 1 -> 0
        let chain: Vec<(i64, i64)> = (0..6).map(|i| (i + 1, i)).collect();
        let graph = graph(&chain);
        assert_eq!(graph.blast_radius(0, 5), 5);
        assert_eq!(graph.blast_radius(0, 2), 2);
        assert_eq!(graph.blast_radius(6, 5), 0);
        assert_eq!(graph.blast_radius(42, 5), 0);
    }

    #[test]
    fn blast_radius_counts_distinct_callers() {
        // diamond: 3 and 4 both call 2 and 1; 2 calls 1
        let graph = graph(&[(2, 1), (3, 1), (3, 2), (4, 2)]);
        assert_eq!(graph.blast_radius(1, 5), 3);
    }

    #[test]
    fn trace_walks_both_directions() {
        // ui -> handler -> service -> fetchUser -> http -> socket
        let graph = graph(&[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6)]);
        let symbols = symbols(&[
            (1, "ui"),
            (2, "handler"),
            (3, "service"),
            (4, "fetchUser"),
            (5, "httpGet"),
            (6, "openSocket"),
        ]);
        let trace = function_trace(&graph, 2, &symbols, 3, None);
        let depths: Vec<(i64, i64)> = trace.nodes.iter().map(|n| (n.id, n.depth)).collect();
        assert_eq!(depths, vec![(2, 0), (3, 1), (4, 2), (5, 3), (1, -1)]);
        assert!(trace.nodes.iter().any(|n| n.id == 4 && n.is_sink));
        assert!(trace.nodes.iter().all(|n| n.id != 6));
        assert_eq!(trace.edges.len(), 4);
        assert_eq!(trace.nodes[0].direction, TraceDirection::Root);
    }

    #[test]
    fn trace_upstream_is_unbounded_by_default() {
        let chain: Vec<(i64, i64)> = (0..10).map(|i| (i + 1, i)).collect();
        let graph = graph(&chain);
        let names: Vec<(i64, String)> = (0..=10).map(|i| (i, format!("f{i}"))).collect();
        let named: Vec<(i64, &str)> = names.iter().map(|(i, n)| (*i, n.as_str())).collect();
        let symbols = symbols(&named);
        let trace = function_trace(&graph, 0, &symbols, 3, None);
        assert_eq!(trace.nodes.len(), 11);
        assert_eq!(trace.nodes.iter().map(|n| n.depth).min(), Some(-10));

        let capped = function_trace(&graph, 0, &symbols, 3, Some(2));
        assert_eq!(capped.nodes.len(), 3);
    }

    #[test]
    fn trace_of_unknown_symbol_is_empty() {
        let trace = function_trace(&CallGraph::default(), 9, &HashMap::new(), 3, None);
        assert!(trace.nodes.is_empty());
        assert!(trace.edges.is_empty());
    }
}
