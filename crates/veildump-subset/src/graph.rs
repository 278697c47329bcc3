//! Foreign-key graph.
//!
//! Nodes are tables; edges run from the referencing (child) table to the
//! referenced (parent) table and carry the column pairing of the
//! constraint. Parallel edges between the same pair of tables are
//! preserved with distinct ids: two different foreign keys between the
//! same tables produce different reachability joins and different cycles.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{SubsetError, SubsetResult};

/// One table node.
#[derive(Debug, Clone)]
pub struct TableNode {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Primary key columns, in key order.
    pub primary_key: Vec<String>,
}

impl TableNode {
    /// Creates a node.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        primary_key: Vec<String>,
    ) -> Self {
        Self { schema: schema.into(), name: name.into(), primary_key }
    }

    /// `schema.name` label used inside synthesized SQL.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// One foreign-key edge, child to parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Stable id; parallel edges get distinct ids.
    pub id: usize,
    /// Referencing (child) node index.
    pub from: usize,
    /// Referenced (parent) node index.
    pub to: usize,
    /// Referencing columns on the child.
    pub from_columns: Vec<String>,
    /// Referenced columns on the parent.
    pub to_columns: Vec<String>,
}

/// The foreign-key graph of a dump.
#[derive(Debug, Default)]
pub struct FkGraph {
    nodes: Vec<TableNode>,
    edges: Vec<Edge>,
    outgoing: FxHashMap<usize, Vec<usize>>,
    incoming: FxHashMap<usize, Vec<usize>>,
}

impl FkGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, returning its node index.
    pub fn add_table(&mut self, node: TableNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Adds a foreign key from `child` to `parent`, returning the edge id.
    ///
    /// # Errors
    ///
    /// Returns [`SubsetError::UnknownTable`] for bad indices and
    /// [`SubsetError::ColumnCountMismatch`] for uneven column lists.
    pub fn add_foreign_key(
        &mut self,
        child: usize,
        parent: usize,
        from_columns: Vec<String>,
        to_columns: Vec<String>,
    ) -> SubsetResult<usize> {
        for index in [child, parent] {
            if index >= self.nodes.len() {
                return Err(SubsetError::UnknownTable(index));
            }
        }
        if from_columns.len() != to_columns.len() {
            return Err(SubsetError::ColumnCountMismatch {
                from: from_columns.len(),
                to: to_columns.len(),
            });
        }
        let id = self.edges.len() + 1;
        self.edges.push(Edge { id, from: child, to: parent, from_columns, to_columns });
        self.outgoing.entry(child).or_default().push(self.edges.len() - 1);
        self.incoming.entry(parent).or_default().push(self.edges.len() - 1);
        Ok(id)
    }

    /// Number of tables.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns [`SubsetError::UnknownTable`] for a bad index.
    pub fn node(&self, index: usize) -> SubsetResult<&TableNode> {
        self.nodes.get(index).ok_or(SubsetError::UnknownTable(index))
    }

    /// All edges, in id order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Outgoing edges of a node (child side), in id order.
    #[must_use]
    pub fn outgoing(&self, node: usize) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .outgoing
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    /// The weakly-connected component containing `start`, ignoring edge
    /// direction, as a sorted node list.
    ///
    /// # Errors
    ///
    /// Returns [`SubsetError::UnknownTable`] for a bad index.
    pub fn weakly_connected_component(&self, start: usize) -> SubsetResult<Vec<usize>> {
        if start >= self.nodes.len() {
            return Err(SubsetError::UnknownTable(start));
        }
        let mut seen = FxHashSet::default();
        let mut stack = vec![start];
        seen.insert(start);
        while let Some(node) = stack.pop() {
            let neighbors = self
                .outgoing
                .get(&node)
                .into_iter()
                .flatten()
                .map(|&i| self.edges[i].to)
                .chain(
                    self.incoming.get(&node).into_iter().flatten().map(|&i| self.edges[i].from),
                );
            for neighbor in neighbors {
                if seen.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        let mut component: Vec<usize> = seen.into_iter().collect();
        component.sort_unstable();
        Ok(component)
    }

    /// Edges whose endpoints both lie in `nodes`, in id order.
    #[must_use]
    pub fn edges_within(&self, nodes: &[usize]) -> Vec<&Edge> {
        let set: FxHashSet<usize> = nodes.iter().copied().collect();
        self.edges.iter().filter(|e| set.contains(&e.from) && set.contains(&e.to)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableNode {
        TableNode::new("public", name, vec!["id".into()])
    }

    #[test]
    fn parallel_edges_get_distinct_ids() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(table("a"));
        let b = graph.add_table(table("b"));
        let first =
            graph.add_foreign_key(a, b, vec!["b_id".into()], vec!["id".into()]).unwrap();
        let second =
            graph.add_foreign_key(a, b, vec!["alt_b_id".into()], vec!["id".into()]).unwrap();
        assert_ne!(first, second);
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn mismatched_columns_rejected() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(table("a"));
        let b = graph.add_table(table("b"));
        let err = graph
            .add_foreign_key(a, b, vec!["x".into(), "y".into()], vec!["id".into()])
            .unwrap_err();
        assert!(matches!(err, SubsetError::ColumnCountMismatch { from: 2, to: 1 }));
    }

    #[test]
    fn weak_component_ignores_direction() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(table("a"));
        let b = graph.add_table(table("b"));
        let c = graph.add_table(table("c"));
        let isolated = graph.add_table(table("d"));
        graph.add_foreign_key(a, b, vec!["b_id".into()], vec!["id".into()]).unwrap();
        graph.add_foreign_key(c, b, vec!["b_id".into()], vec!["id".into()]).unwrap();

        let component = graph.weakly_connected_component(a).unwrap();
        assert_eq!(component, vec![a, b, c]);
        let lone = graph.weakly_connected_component(isolated).unwrap();
        assert_eq!(lone, vec![isolated]);
    }
}
