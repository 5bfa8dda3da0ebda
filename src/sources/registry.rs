//! Registry mapping source names to provider instances.

use std::collections::HashMap;
use std::sync::Arc;

use super::Source;

/// Errors raised by registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A source with the same name is already registered
    #[error("Source '{0}' is already registered")]
    DuplicateSource(String),

    /// No source registered under the given name
    #[error("Unknown source: '{0}'")]
    UnknownSource(String),
}

/// Registry for all available sources.
///
/// Owns the provider instances for the orchestrator's lifetime and keeps
/// track of registration order, which defines the default dispatch order.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
    order: Vec<String>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own id.
    ///
    /// Fails with [`RegistryError::DuplicateSource`] if the name is taken;
    /// an existing registration is never silently overwritten.
    pub fn register(&mut self, source: Arc<dyn Source>) -> Result<(), RegistryError> {
        let name = source.id().to_string();
        if self.sources.contains_key(&name) {
            return Err(RegistryError::DuplicateSource(name));
        }
        self.order.push(name.clone());
        self.sources.insert(name, source);
        Ok(())
    }

    /// Get a source by name
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Source>, RegistryError> {
        self.sources
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSource(name.to_string()))
    }

    /// Check if a source is registered
    pub fn has(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Registered source names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    #[test]
    fn test_register_and_get() {
        let mut registry = SourceRegistry::new();
        registry
            .register(Arc::new(MockSource::named("arxiv")))
            .unwrap();

        assert!(registry.has("arxiv"));
        assert_eq!(registry.get("arxiv").unwrap().id(), "arxiv");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = SourceRegistry::new();
        registry
            .register(Arc::new(MockSource::named("arxiv")))
            .unwrap();

        let err = registry
            .register(Arc::new(MockSource::named("arxiv")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSource(name) if name == "arxiv"));
        // The original registration survives
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_source() {
        let registry = SourceRegistry::new();
        let err = registry.get("nonexistent").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSource(name) if name == "nonexistent"));
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut registry = SourceRegistry::new();
        for name in ["crossref", "arxiv", "pubmed"] {
            registry.register(Arc::new(MockSource::named(name))).unwrap();
        }

        assert_eq!(registry.names(), ["crossref", "arxiv", "pubmed"]);
    }
}
