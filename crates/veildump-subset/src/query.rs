//! Filter-SQL synthesis.
//!
//! For every table in the seed's component the engine emits a query of the
//! shape
//!
//! ```sql
//! WITH RECURSIVE reachable AS (
//!     SELECT '<seed label>' AS tbl, ARRAY[s."pk"::text, ...] AS keys, 0 AS depth
//!     FROM "schema"."seed" s
//!     WHERE <condition>
//!   UNION
//!     -- two branches per foreign-key edge:
//!     --   closure:      selected child rows pull their referenced parents
//!     --   reachability: selected parent rows pull their referencing children
//!     ...
//! )
//! SELECT "t".* FROM "schema"."table" "t"
//! JOIN (SELECT DISTINCT keys FROM reachable WHERE tbl = '<label>') "r"
//!   ON ARRAY["t"."pk"::text, ...] = "r".keys
//! ```
//!
//! The reachability set is keyed by primary key rendered as a text array,
//! which keeps one CTE sufficient for tables with heterogeneous keys. The
//! closure branches are the reverse joins guaranteeing that no selected
//! row dangles: whenever a child row is in the set, the parent rows it
//! references join into the set too.
//!
//! `UNION` (not `UNION ALL`) makes the recursion reach a fixed point even
//! through cycles; when the component is cyclic the branches additionally
//! carry a depth guard bounding the fixed-point iteration.
//!
//! For fixed inputs the emitted SQL is byte-identical across runs: nodes
//! are processed in index order and edges in id order.

use std::fmt::Write as _;

use tracing::debug;

use crate::cycles::{find_cycles, Cycle};
use crate::error::{SubsetError, SubsetResult};
use crate::graph::{Edge, FkGraph, TableNode};

/// Tuning knobs for query synthesis.
#[derive(Debug, Clone)]
pub struct SubsetOptions {
    /// Bound on the reachability fixed point when the component is cyclic.
    pub max_iterations: u32,
}

impl Default for SubsetOptions {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

/// A synthesized per-table filter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// Node index of the table.
    pub node: usize,
    /// Full `SELECT` returning exactly the rows to dump.
    pub sql: String,
}

/// The complete subset plan for one seed.
#[derive(Debug, Clone)]
pub struct SubsetPlan {
    /// Sorted node indices of the seed's weak component.
    pub component: Vec<usize>,
    /// Simple cycles found within the component.
    pub cycles: Vec<Cycle>,
    /// One query per component table, in node order.
    pub queries: Vec<TableQuery>,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn qualified(node: &TableNode) -> String {
    format!("{}.{}", quote_ident(&node.schema), quote_ident(&node.name))
}

fn key_array(alias: &str, columns: &[String]) -> String {
    let mut out = String::from("ARRAY[");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{alias}.{}::text", quote_ident(column));
    }
    out.push(']');
    out
}

fn join_condition(
    left_alias: &str,
    left_columns: &[String],
    right_alias: &str,
    right_columns: &[String],
) -> String {
    let mut out = String::new();
    for (i, (left, right)) in left_columns.iter().zip(right_columns).enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        let _ = write!(
            out,
            "{left_alias}.{} = {right_alias}.{}",
            quote_ident(left),
            quote_ident(right)
        );
    }
    out
}

struct BranchSpec<'a> {
    /// Table whose reachability membership the branch consumes.
    source: &'a TableNode,
    /// Table the branch adds to the reachability set.
    target: &'a TableNode,
    /// Join from source alias `s` to target alias `t`.
    join: String,
}

fn branch_sql(spec: &BranchSpec<'_>, depth_guard: Option<u32>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "    SELECT {} AS tbl, {} AS keys, r.depth + 1 AS depth\n",
        quote_literal(&spec.target.label()),
        key_array("t", &spec.target.primary_key),
    );
    let _ = write!(
        out,
        "    FROM reachable r\n    JOIN {} s ON r.tbl = {} AND {} = r.keys\n",
        qualified(spec.source),
        quote_literal(&spec.source.label()),
        key_array("s", &spec.source.primary_key),
    );
    let _ = write!(out, "    JOIN {} t ON {}", qualified(spec.target), spec.join);
    if let Some(limit) = depth_guard {
        let _ = write!(out, "\n    WHERE r.depth < {limit}");
    }
    out
}

fn component_cte(
    graph: &FkGraph,
    component: &[usize],
    seed: usize,
    condition: &str,
    depth_guard: Option<u32>,
) -> SubsetResult<String> {
    let seed_node = graph.node(seed)?;
    let mut cte = String::from("WITH RECURSIVE reachable AS (\n");
    let _ = write!(
        cte,
        "    SELECT {} AS tbl, {} AS keys, 0 AS depth\n    FROM {} s\n    WHERE {condition}",
        quote_literal(&seed_node.label()),
        key_array("s", &seed_node.primary_key),
        qualified(seed_node),
    );

    for edge in graph.edges_within(component) {
        let child = graph.node(edge.from)?;
        let parent = graph.node(edge.to)?;

        // Closure: a selected child row requires its referenced parent row.
        let closure = BranchSpec {
            source: child,
            target: parent,
            join: join_condition("t", &edge.to_columns, "s", &edge.from_columns),
        };
        cte.push_str("\n  UNION\n");
        cte.push_str(&branch_sql(&closure, depth_guard));

        // Reachability: a selected parent row pulls its referencing children.
        let reachability = BranchSpec {
            source: parent,
            target: child,
            join: join_condition("t", &edge.from_columns, "s", &edge.to_columns),
        };
        cte.push_str("\n  UNION\n");
        cte.push_str(&branch_sql(&reachability, depth_guard));
    }
    cte.push_str("\n)");
    Ok(cte)
}

/// Builds the subset plan for `seed` with the given seed condition.
///
/// Tables outside the seed's weak component get no query; the caller dumps
/// them unfiltered or excludes them per config.
///
/// # Errors
///
/// Returns [`SubsetError::NoPrimaryKey`] if a component table lacks a
/// primary key and [`SubsetError::UnknownTable`] for a bad seed index.
pub fn build_subset_plan(
    graph: &FkGraph,
    seed: usize,
    condition: &str,
    options: &SubsetOptions,
) -> SubsetResult<SubsetPlan> {
    let component = graph.weakly_connected_component(seed)?;
    for &index in &component {
        let node = graph.node(index)?;
        if node.primary_key.is_empty() {
            return Err(SubsetError::NoPrimaryKey {
                schema: node.schema.clone(),
                name: node.name.clone(),
            });
        }
    }

    let cycles = find_cycles(graph, &component);
    if !cycles.is_empty() {
        debug!(
            cycles = cycles.len(),
            component = component.len(),
            "subset component is cyclic; bounding the reachability fixed point"
        );
    }
    let depth_guard = if cycles.is_empty() { None } else { Some(options.max_iterations) };

    let cte = component_cte(graph, &component, seed, condition, depth_guard)?;
    let mut queries = Vec::with_capacity(component.len());
    for &index in &component {
        let node = graph.node(index)?;
        let mut sql = cte.clone();
        let _ = write!(
            sql,
            "\nSELECT \"t\".* FROM {} \"t\"\nJOIN (SELECT DISTINCT keys FROM reachable WHERE tbl = {}) \"r\"\n  ON {} = \"r\".keys",
            qualified(node),
            quote_literal(&node.label()),
            key_array("\"t\"", &node.primary_key),
        );
        queries.push(TableQuery { node: index, sql });
    }

    Ok(SubsetPlan { component, cycles, queries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TableNode;

    fn orders_graph() -> (FkGraph, usize, usize, usize) {
        let mut graph = FkGraph::new();
        let users = graph.add_table(TableNode::new("public", "users", vec!["id".into()]));
        let orders = graph.add_table(TableNode::new("public", "orders", vec!["id".into()]));
        let items = graph.add_table(TableNode::new("public", "order_items", vec![
            "order_id".into(),
            "line_no".into(),
        ]));
        graph
            .add_foreign_key(orders, users, vec!["user_id".into()], vec!["id".into()])
            .unwrap();
        graph
            .add_foreign_key(items, orders, vec!["order_id".into()], vec!["id".into()])
            .unwrap();
        (graph, users, orders, items)
    }

    #[test]
    fn every_component_table_gets_a_query() {
        let (graph, users, _, _) = orders_graph();
        let plan =
            build_subset_plan(&graph, users, "s.\"id\" < 100", &SubsetOptions::default()).unwrap();
        assert_eq!(plan.component.len(), 3);
        assert_eq!(plan.queries.len(), 3);
        assert!(plan.cycles.is_empty());
        for query in &plan.queries {
            assert!(query.sql.starts_with("WITH RECURSIVE reachable AS ("));
            assert!(query.sql.contains("s.\"id\" < 100"));
        }
    }

    #[test]
    fn closure_and_reachability_branches_exist_per_edge() {
        let (graph, users, _, _) = orders_graph();
        let plan =
            build_subset_plan(&graph, users, "TRUE", &SubsetOptions::default()).unwrap();
        let sql = &plan.queries[0].sql;
        // 2 edges, 2 branches each.
        assert_eq!(sql.matches("UNION").count(), 4);
        // Closure join: parent key equals child's referencing column.
        assert!(sql.contains("JOIN \"public\".\"users\" t ON t.\"id\" = s.\"user_id\""));
        // Reachability join: child's referencing column equals parent key.
        assert!(sql.contains("JOIN \"public\".\"orders\" t ON t.\"user_id\" = s.\"id\""));
    }

    #[test]
    fn acyclic_component_has_no_depth_guard() {
        let (graph, users, _, _) = orders_graph();
        let plan = build_subset_plan(&graph, users, "TRUE", &SubsetOptions::default()).unwrap();
        assert!(!plan.queries[0].sql.contains("r.depth <"));
    }

    #[test]
    fn cyclic_component_is_depth_bounded() {
        let (mut graph, users, orders, _) = orders_graph();
        // users carries a favorite_order_id back-reference, closing a cycle.
        graph
            .add_foreign_key(users, orders, vec!["favorite_order_id".into()], vec!["id".into()])
            .unwrap();
        let plan = build_subset_plan(
            &graph,
            users,
            "TRUE",
            &SubsetOptions { max_iterations: 25 },
        )
        .unwrap();
        assert_eq!(plan.cycles.len(), 1);
        assert!(plan.queries[0].sql.contains("WHERE r.depth < 25"));
    }

    #[test]
    fn emitted_sql_is_deterministic() {
        let (graph, users, _, _) = orders_graph();
        let options = SubsetOptions::default();
        let first = build_subset_plan(&graph, users, "s.\"id\" = 1", &options).unwrap();
        let second = build_subset_plan(&graph, users, "s.\"id\" = 1", &options).unwrap();
        for (a, b) in first.queries.iter().zip(&second.queries) {
            assert_eq!(a.sql, b.sql);
        }
    }

    #[test]
    fn composite_keys_render_as_arrays() {
        let (graph, users, _, items) = orders_graph();
        let plan = build_subset_plan(&graph, users, "TRUE", &SubsetOptions::default()).unwrap();
        let items_query = plan.queries.iter().find(|q| q.node == items).unwrap();
        assert!(items_query
            .sql
            .contains("ARRAY[\"t\".\"order_id\"::text, \"t\".\"line_no\"::text]"));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let mut graph = FkGraph::new();
        let a = graph.add_table(TableNode::new("public", "a", vec!["id".into()]));
        let b = graph.add_table(TableNode::new("public", "b", Vec::new()));
        graph.add_foreign_key(b, a, vec!["a_id".into()], vec!["id".into()]).unwrap();

        let err = build_subset_plan(&graph, a, "TRUE", &SubsetOptions::default()).unwrap_err();
        assert!(matches!(err, SubsetError::NoPrimaryKey { .. }));
    }

    #[test]
    fn tables_outside_component_are_unfiltered() {
        let (mut graph, users, _, _) = orders_graph();
        let lonely = graph.add_table(TableNode::new("public", "audit_log", vec!["id".into()]));
        let plan = build_subset_plan(&graph, users, "TRUE", &SubsetOptions::default()).unwrap();
        assert!(!plan.component.contains(&lonely));
        assert!(plan.queries.iter().all(|q| q.node != lonely));
    }
}
