//! veildump subset engine.
//!
//! A subset dump restricts every table to the rows reachable from a seed
//! condition through the foreign-key graph, in both directions, while
//! keeping referential closure: no selected row may reference an
//! unselected one.
//!
//! The crate is pure query synthesis. It never talks to a database: the
//! catalog feeds it tables and foreign keys, and it hands back one SQL
//! query per table for the dump path to use in place of a bare
//! `SELECT *`.
//!
//! # Pipeline
//!
//! 1. [`FkGraph`] models tables and foreign keys, preserving parallel
//!    edges.
//! 2. [`FkGraph::weakly_connected_component`] scopes the seed's influence;
//!    tables outside the component are dumped unfiltered or excluded per
//!    config.
//! 3. [`find_cycles`] enumerates simple circuits; cycle identity is the
//!    canonically rotated edge-id sequence, so parallel foreign keys
//!    produce distinct cycles.
//! 4. [`build_subset_plan`] emits deterministic per-table queries,
//!    bounding the reachability fixed point when the component is cyclic.

pub mod cycles;
mod error;
pub mod graph;
pub mod query;

pub use cycles::{cyclic_edge_ids, find_cycles, Cycle};
pub use error::{SubsetError, SubsetResult};
pub use graph::{Edge, FkGraph, TableNode};
pub use query::{build_subset_plan, SubsetOptions, SubsetPlan, TableQuery};
