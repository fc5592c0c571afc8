//! The flat getter surface.
//!
//! One map from exposed getter name to the owning module's cached computed
//! slot. Reading a key never requires knowing which module owns it; the
//! aggregator forwards the read to the owner's [`Computed`] cell and never
//! re-invokes getter bodies itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::context::GetterContext;
use super::module::ModuleInstance;
use super::store::StoreInner;

/// A forwarding entry: which module owns the getter and under which local key.
#[derive(Clone)]
pub(crate) struct GetterEntry {
    pub(crate) owner: Arc<ModuleInstance>,
    pub(crate) local: String,
}

pub(crate) struct GetterAggregator {
    index: RwLock<HashMap<String, GetterEntry>>,
}

impl GetterAggregator {
    pub(crate) fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Install forwarding entries for every getter the module defines.
    ///
    /// A name already taken keeps its first registration; the duplicate is
    /// skipped with a warning rather than silently shadowing.
    pub(crate) fn install_module(&self, module: &Arc<ModuleInstance>) {
        let mut index = self.index.write();
        for local in module.getters.keys() {
            let exposed = module.exposed_getter_name(local);
            if index.contains_key(&exposed) {
                tracing::warn!(
                    getter = exposed.as_str(),
                    module = module.path.as_str(),
                    "duplicate getter name, keeping first registration"
                );
                continue;
            }
            index.insert(
                exposed,
                GetterEntry {
                    owner: module.clone(),
                    local: local.clone(),
                },
            );
        }
    }

    /// Remove every entry a module installed. Subsequent reads of those
    /// names behave as not-found, never as a stale cached value.
    pub(crate) fn remove_owner(&self, path: &str) {
        self.index.write().retain(|_, entry| entry.owner.path != path);
    }

    /// Read an exposed getter name, forwarding to the owner's computed cell.
    ///
    /// The index lock is released before evaluation, so getter bodies may
    /// read other getters re-entrantly.
    pub(crate) fn read(&self, inner: &StoreInner, name: &str) -> Option<Value> {
        let entry = self.index.read().get(name).cloned()?;
        let slot = entry.owner.getters.get(&entry.local)?;
        let ctx = GetterContext {
            store: inner,
            module: &entry.owner,
        };
        Some(slot.cell.get_or_eval(|| (slot.body)(&ctx)))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.read().contains_key(name)
    }

    /// All exposed names, unordered.
    pub(crate) fn names(&self) -> Vec<String> {
        self.index.read().keys().cloned().collect()
    }
}
