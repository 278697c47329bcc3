//! veildump transformers.
//!
//! This crate holds everything about rewriting column values: the
//! [`Transformer`] trait, the declaration model
//! ([`TransformerDefinition`], [`Parameter`], [`ColumnProperties`]), the
//! [`TransformerRegistry`], parameter resolution, the built-in transformer
//! set, and the external stdio protocol.
//!
//! # Binding flow
//!
//! Config names a transformer and supplies raw parameters. Binding
//! resolves the parameters against the table's columns (defaults,
//! required checks, column lookups, allowed-type checks, linked
//! bindings), runs the definition's validation hook, and builds an
//! instance only when no warning has error severity. The resulting
//! [`BoundTransformer`] knows which column ordinals it writes and which
//! NULLs bypass it, so the driver and the catalog can reason about the
//! chain without running it.

pub mod definition;
mod error;
pub mod external;
pub mod params;
mod registry;
mod transformer;
pub mod transformers;

pub use definition::{ColumnProperties, Parameter, TransformContext, TransformerDefinition};
pub use error::{TransformError, TransformResult};
pub use external::{bootstrap_custom_transformers, CustomTransformerSpec};
pub use params::{resolve_parameters, RawParams, ResolvedParams, ResolvedValue};
pub use registry::TransformerRegistry;
pub use transformer::{BoundTransformer, Transformer};
