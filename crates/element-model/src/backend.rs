//! Backend contract and the registry that selects backends by name

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use souldesk_core_types::NativeId;
use tracing::{debug, info};

use crate::element::ElementRef;
use crate::errors::{ElementError, ElementResult};

/// Feature flags a backend advertises to the locator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Title regex matching is done by the backend itself rather than emulated
    pub native_title_re: bool,
}

/// Technology-specific accessor (Win32 handles, UI Automation, AT-SPI, ...).
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// The desktop: parent of every top-level element
    fn root(&self) -> ElementResult<ElementRef>;

    /// Rebuild a handle from a raw native reference
    fn from_native(&self, id: &NativeId) -> ElementResult<ElementRef>;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    /// Full-string title regex test. Backends with `native_title_re` override this.
    fn title_matches(&self, element: &ElementRef, pattern: &Regex) -> ElementResult<bool> {
        Ok(pattern.is_match(&element.name()?))
    }
}

static GLOBAL_REGISTRY: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::new);

/// Backends keyed by name.
#[derive(Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static BackendRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register a backend, returning the one it replaced
    pub fn register(&self, backend: Arc<dyn Backend>) -> Option<Arc<dyn Backend>> {
        let name = backend.name().to_string();
        info!("Registering element backend: {}", name);
        self.backends.insert(name, backend)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.remove(name).map(|(_, backend)| backend)
    }

    pub fn get(&self, name: &str) -> ElementResult<Arc<dyn Backend>> {
        debug!("Looking up backend: {}", name);
        self.backends
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ElementError::UnknownBackend(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .backends
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, MemoryTree, MEMORY_BACKEND};

    #[test]
    fn test_register_and_lookup() {
        let registry = BackendRegistry::new();
        assert!(registry.get(MEMORY_BACKEND).is_err());

        let backend = Arc::new(MemoryBackend::new(MemoryTree::new()));
        assert!(registry.register(backend).is_none());
        assert!(registry.contains(MEMORY_BACKEND));
        assert_eq!(registry.names(), vec![MEMORY_BACKEND.to_string()]);

        let found = registry.get(MEMORY_BACKEND).unwrap();
        assert_eq!(found.name(), MEMORY_BACKEND);
    }

    #[test]
    fn test_register_replaces_existing() {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(MemoryBackend::new(MemoryTree::new())));
        let replaced = registry.register(Arc::new(MemoryBackend::new(MemoryTree::new())));
        assert!(replaced.is_some());
        assert_eq!(registry.names().len(), 1);

        assert!(registry.unregister(MEMORY_BACKEND).is_some());
        assert!(matches!(
            registry.get(MEMORY_BACKEND),
            Err(ElementError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_default_title_matching_is_emulated() {
        let tree = MemoryTree::new();
        let backend = MemoryBackend::new(tree.clone());
        assert!(!backend.capabilities().native_title_re);

        let desktop = backend.root().unwrap();
        let pattern = Regex::new("^Desk.*$").unwrap();
        assert!(backend.title_matches(&desktop, &pattern).unwrap());
    }
}
