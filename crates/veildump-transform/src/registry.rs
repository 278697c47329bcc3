//! The transformer registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::definition::TransformerDefinition;
use crate::error::{TransformError, TransformResult};
use crate::transformers;

/// Mapping from transformer name to definition.
///
/// The registry is an explicit dependency of the dump, validate, and
/// show-transformer paths rather than process-global state: tests build
/// empty registries, and the CLI builds one with the built-ins plus any
/// bootstrapped external transformers. After bootstrap it is read-only and
/// can be shared across workers behind an `Arc` without locking.
#[derive(Debug, Default)]
pub struct TransformerRegistry {
    definitions: BTreeMap<String, Arc<TransformerDefinition>>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in transformer.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for definition in transformers::builtin_definitions() {
            // Built-in names are distinct by construction.
            let _ = registry.register(definition);
        }
        registry
    }

    /// Registers a definition.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::DuplicateRegistration`] if the name is
    /// taken.
    pub fn register(&mut self, definition: TransformerDefinition) -> TransformResult<()> {
        let name = definition.name.clone();
        if self.definitions.contains_key(&name) {
            return Err(TransformError::DuplicateRegistration(name));
        }
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<TransformerDefinition>> {
        self.definitions.get(name).cloned()
    }

    /// Looks up a definition, failing with a typed error.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownTransformer`] if absent.
    pub fn require(&self, name: &str) -> TransformResult<Arc<TransformerDefinition>> {
        self.get(name).ok_or_else(|| TransformError::UnknownTransformer(name.to_owned()))
    }

    /// Iterates over definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TransformerDefinition>> {
        self.definitions.values()
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
