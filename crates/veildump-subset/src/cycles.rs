//! Simple-cycle enumeration.
//!
//! Subset queries need to know which foreign keys participate in cycles:
//! cyclic edges cannot be folded into plain recursive joins and instead
//! bound the reachability fixed point. Cycles are enumerated as simple
//! circuits over edges, so two parallel foreign keys between the same
//! tables yield two distinct cycles.

use rustc_hash::{FxHashSet, FxHashMap};

use crate::graph::FkGraph;

/// One simple cycle, as edge ids in traversal order.
///
/// The sequence is rotated so the smallest edge id comes first, which
/// makes the identity of a cycle independent of where the search entered
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Edge ids, canonically rotated.
    pub edge_ids: Vec<usize>,
}

impl Cycle {
    /// The canonical identity string, used for deduplication.
    #[must_use]
    pub fn ident(&self) -> String {
        let mut out = String::new();
        for (i, id) in self.edge_ids.iter().enumerate() {
            if i > 0 {
                out.push('-');
            }
            out.push_str(&id.to_string());
        }
        out
    }
}

fn canonical_rotation(edge_ids: &[usize]) -> Vec<usize> {
    let min_pos = edge_ids
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(pos, _)| pos)
        .unwrap_or(0);
    let mut rotated = Vec::with_capacity(edge_ids.len());
    rotated.extend_from_slice(&edge_ids[min_pos..]);
    rotated.extend_from_slice(&edge_ids[..min_pos]);
    rotated
}

struct CycleSearch<'a> {
    graph: &'a FkGraph,
    component: FxHashSet<usize>,
    start: usize,
    path_edges: Vec<usize>,
    on_path: FxHashSet<usize>,
    idents: FxHashMap<String, ()>,
    found: Vec<Cycle>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: usize) {
        for edge in self.graph.outgoing(node) {
            if !self.component.contains(&edge.to) || edge.to < self.start {
                continue;
            }
            if edge.to == self.start {
                self.path_edges.push(edge.id);
                let cycle = Cycle { edge_ids: canonical_rotation(&self.path_edges) };
                self.path_edges.pop();
                if self.idents.insert(cycle.ident(), ()).is_none() {
                    self.found.push(cycle);
                }
            } else if !self.on_path.contains(&edge.to) {
                self.on_path.insert(edge.to);
                self.path_edges.push(edge.id);
                self.visit(edge.to);
                self.path_edges.pop();
                self.on_path.remove(&edge.to);
            }
        }
    }
}

/// Enumerates every simple cycle within `component`.
///
/// The result is deterministic: cycles are sorted by their canonical edge
/// sequence.
#[must_use]
pub fn find_cycles(graph: &FkGraph, component: &[usize]) -> Vec<Cycle> {
    let mut search = CycleSearch {
        graph,
        component: component.iter().copied().collect(),
        start: 0,
        path_edges: Vec::new(),
        on_path: FxHashSet::default(),
        idents: FxHashMap::default(),
        found: Vec::new(),
    };

    let mut starts: Vec<usize> = component.to_vec();
    starts.sort_unstable();
    for start in starts {
        search.start = start;
        search.on_path.clear();
        search.on_path.insert(start);
        search.path_edges.clear();
        search.visit(start);
    }

    search.found.sort_by(|a, b| a.edge_ids.cmp(&b.edge_ids));
    search.found
}

/// Edge ids participating in at least one cycle.
#[must_use]
pub fn cyclic_edge_ids(cycles: &[Cycle]) -> FxHashSet<usize> {
    cycles.iter().flat_map(|c| c.edge_ids.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FkGraph, TableNode};

    fn table(name: &str) -> TableNode {
        TableNode::new("public", name, vec!["id".into()])
    }

    fn fk(graph: &mut FkGraph, from: usize, to: usize) -> usize {
        graph.add_foreign_key(from, to, vec!["ref_id".into()], vec!["id".into()]).unwrap()
    }

    /// Four tables, a 3-cycle with one doubled edge, and a 2-cycle hanging
    /// off it: exactly four distinct simple cycles.
    #[test]
    fn doubled_edge_produces_four_cycles() {
        let mut graph = FkGraph::new();
        let t1 = graph.add_table(table("t1"));
        let t2 = graph.add_table(table("t2"));
        let t3 = graph.add_table(table("t3"));
        let t4 = graph.add_table(table("t4"));

        fk(&mut graph, t1, t2); // 1
        fk(&mut graph, t2, t3); // 2
        fk(&mut graph, t3, t1); // 3
        fk(&mut graph, t3, t1); // 4 (parallel to 3)
        fk(&mut graph, t3, t4); // 5
        fk(&mut graph, t4, t3); // 6
        fk(&mut graph, t4, t1); // 7

        let component = graph.weakly_connected_component(t1).unwrap();
        let cycles = find_cycles(&graph, &component);
        assert_eq!(cycles.len(), 4, "cycles: {cycles:?}");

        let idents: Vec<String> = cycles.iter().map(Cycle::ident).collect();
        assert_eq!(idents, vec!["1-2-3", "1-2-4", "1-2-5-7", "5-6"]);
    }

    /// Two tables with a doubled back edge: two distinct 2-cycles.
    #[test]
    fn parallel_back_edges_produce_two_cycles() {
        let mut graph = FkGraph::new();
        let t1 = graph.add_table(table("t1"));
        let t2 = graph.add_table(table("t2"));

        fk(&mut graph, t1, t2); // 1
        fk(&mut graph, t2, t1); // 2
        fk(&mut graph, t2, t1); // 3 (parallel to 2)

        let component = graph.weakly_connected_component(t1).unwrap();
        let cycles = find_cycles(&graph, &component);
        assert_eq!(cycles.len(), 2);
        let idents: Vec<String> = cycles.iter().map(Cycle::ident).collect();
        assert_eq!(idents, vec!["1-2", "1-3"]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(table("a"));
        let b = graph.add_table(table("b"));
        let c = graph.add_table(table("c"));
        fk(&mut graph, a, b);
        fk(&mut graph, b, c);
        fk(&mut graph, a, c);

        let component = graph.weakly_connected_component(a).unwrap();
        assert!(find_cycles(&graph, &component).is_empty());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(table("a"));
        fk(&mut graph, a, a);

        let cycles = find_cycles(&graph, &[a]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].edge_ids, vec![1]);
    }

    #[test]
    fn cyclic_edges_are_collected() {
        let mut graph = FkGraph::new();
        let t1 = graph.add_table(table("t1"));
        let t2 = graph.add_table(table("t2"));
        let t3 = graph.add_table(table("t3"));
        fk(&mut graph, t1, t2); // 1
        fk(&mut graph, t2, t1); // 2
        fk(&mut graph, t1, t3); // 3, acyclic

        let cycles = find_cycles(&graph, &[t1, t2, t3]);
        let cyclic = cyclic_edge_ids(&cycles);
        assert!(cyclic.contains(&1) && cyclic.contains(&2));
        assert!(!cyclic.contains(&3));
    }
}
