//! Explicit store installation registry.
//!
//! Components deep in an application tree need the active store without
//! prop-drilling. Rather than a process-wide mutable map, installation is
//! scoped to an owned [`StoreRegistry`] value passed as context: two
//! registries can hold different stores under the same key without leaking
//! into each other, which keeps independent store instances (tests,
//! multi-tenant hosts) isolated.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::store::Store;

/// String-keyed registry of installed store handles.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve an installed store by key.
    pub fn get(&self, key: &str) -> Option<Store> {
        self.stores.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stores.read().contains_key(key)
    }

    /// Remove an installation. Idempotent.
    pub fn remove(&self, key: &str) -> bool {
        self.stores.write().remove(key).is_some()
    }

    pub(crate) fn insert(&self, key: String, store: Store) {
        self.stores.write().insert(key, store);
    }
}

impl Store {
    /// Install this store under `key` in the given registry, replacing any
    /// previous installation under the same key.
    pub fn install(&self, registry: &StoreRegistry, key: impl Into<String>) {
        registry.insert(key.into(), self.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ModuleDescriptor;
    use serde_json::json;

    #[test]
    fn test_registries_are_isolated() {
        let store_a = Store::new(ModuleDescriptor::new().state(json!({"who": "a"}))).unwrap();
        let store_b = Store::new(ModuleDescriptor::new().state(json!({"who": "b"}))).unwrap();

        let registry_a = StoreRegistry::new();
        let registry_b = StoreRegistry::new();
        store_a.install(&registry_a, "app");
        store_b.install(&registry_b, "app");

        let got_a = registry_a.get("app").unwrap();
        let got_b = registry_b.get("app").unwrap();
        assert_eq!(got_a.state().get("who"), json!("a"));
        assert_eq!(got_b.state().get("who"), json!("b"));
    }

    #[test]
    fn test_install_replaces_and_remove_is_idempotent() {
        let first = Store::new(ModuleDescriptor::new().state(json!({"n": 1}))).unwrap();
        let second = Store::new(ModuleDescriptor::new().state(json!({"n": 2}))).unwrap();

        let registry = StoreRegistry::new();
        first.install(&registry, "app");
        second.install(&registry, "app");
        assert_eq!(registry.get("app").unwrap().state().get("n"), json!(2));

        assert!(registry.remove("app"));
        assert!(!registry.remove("app"));
        assert!(!registry.contains("app"));
    }
}
