//! Validation warnings.
//!
//! Catalog and transformer validation produce warnings rather than hard
//! errors so that one pass can report every problem at once. A warning
//! carries a severity, a message, and a `meta` map locating the problem
//! (table, column, parameter). The canonical md5 hash over all three lets
//! users acknowledge a known warning in config (`validate.resolved-warnings`)
//! and have it suppressed on later runs.

use std::collections::BTreeMap;
use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Warning severity. A batch containing any `Error` warning is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single validation warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Human-readable description of the problem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,

    /// Severity of the warning.
    pub severity: Severity,

    /// Structured context: table, column, parameter name and the like.
    /// Kept sorted so the hash is independent of insertion order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,

    /// Canonical hash, filled by [`ValidationWarning::make_hash`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ValidationWarning {
    /// Creates a warning with the given severity and empty message.
    #[must_use]
    pub fn new(severity: Severity) -> Self {
        Self { msg: String::new(), severity, meta: BTreeMap::new(), hash: None }
    }

    /// Creates a `Warning`-severity warning.
    #[must_use]
    pub fn warning() -> Self {
        Self::new(Severity::Warning)
    }

    /// Creates an `Error`-severity warning.
    #[must_use]
    pub fn error() -> Self {
        Self::new(Severity::Error)
    }

    /// Sets the message.
    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    /// Adds a meta entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Computes the canonical hash without storing it.
    ///
    /// The signature is `msg=<msg> severity=<severity>` followed by
    /// ` <key>=<value>` for every meta entry in key order. String meta
    /// values render bare; other values render as compact JSON. The hash is
    /// therefore stable under meta-key reordering and unstable under any
    /// change of message, severity, or values.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut meta = String::new();
        for (key, value) in &self.meta {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            meta.push(' ');
            meta.push_str(key);
            meta.push('=');
            meta.push_str(&rendered);
        }
        let signature = format!("msg={} severity={} {}", self.msg, self.severity, meta);
        let digest = Md5::digest(signature.as_bytes());
        hex_string(&digest)
    }

    /// Computes and stores the canonical hash.
    pub fn make_hash(&mut self) {
        self.hash = Some(self.compute_hash());
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Returns `true` if any warning in the batch has `Error` severity.
#[must_use]
pub fn is_fatal(warnings: &[ValidationWarning]) -> bool {
    warnings.iter().any(|w| w.severity == Severity::Error)
}

/// Drops warnings whose hash appears in `resolved`, computing hashes along
/// the way.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if a resolved hash matches a warning
/// with `Error` severity: errors cannot be acknowledged away.
pub fn suppress_resolved(
    warnings: &[ValidationWarning],
    resolved: &[String],
) -> CoreResult<Vec<ValidationWarning>> {
    let mut remaining = Vec::with_capacity(warnings.len());
    for warning in warnings {
        let mut warning = warning.clone();
        warning.make_hash();
        let hash = warning.hash.clone().unwrap_or_default();
        if resolved.contains(&hash) {
            if warning.severity == Severity::Error {
                return Err(CoreError::Validation(format!(
                    "warning with hash {hash} cannot be excluded because it is an error"
                )));
            }
            continue;
        }
        remaining.push(warning);
    }
    Ok(remaining)
}
