//! Wire types of the external transformer protocol.
//!
//! The protocol is JSON lines over the child's stdio:
//!
//! 1. On startup the child writes one line: its [`ExternalDefinition`].
//! 2. The parent replies with one [`SetupMessage`] naming the bound column
//!    indices and the resolved parameter values.
//! 3. For every row the parent writes a [`RowRequest`]; the child answers
//!    with a [`RowReply`] carrying either the rewritten row or an error.
//! 4. An empty line signals end of input; the child must exit 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use veildump_core::ValidationWarning;

use crate::definition::Parameter;

/// Definition the child announces on startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDefinition {
    /// Transformer name as it will appear in the registry.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Declared parameters, using the same schema as built-ins.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// One column binding the parent announces in the setup message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupColumn {
    /// Zero-based index within the COPY row.
    pub index: usize,
    /// Column name.
    pub name: String,
    /// Canonical type name.
    pub type_name: String,
}

/// Parent reply to the definition line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupMessage {
    /// Columns bound by the resolved parameters.
    pub columns: Vec<SetupColumn>,
    /// Resolved parameter values.
    pub params: BTreeMap<String, serde_json::Value>,
}

/// One row sent to the child. Cells are UTF-8 text; NULL is `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRequest {
    /// Cell values in column order.
    pub row: Vec<Option<String>>,
    /// One-based ordinal of the row within the table stream.
    #[serde(rename = "rowNo")]
    pub row_no: u64,
}

/// The child's answer to a [`RowRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowReply {
    /// The rewritten row; required unless `error` is set.
    #[serde(default)]
    pub row: Option<Vec<Option<String>>>,
    /// Warnings to surface through the normal validation channel.
    #[serde(default)]
    pub warnings: Option<Vec<ValidationWarning>>,
    /// Fatal failure for this row.
    #[serde(default)]
    pub error: Option<String>,
}
