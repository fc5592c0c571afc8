//! Live module instances.
//!
//! A [`ModuleInstance`] is the materialized runtime form of a
//! [`ModuleDescriptor`](super::descriptor::ModuleDescriptor): one reactive
//! state container plus three separate callable tables (mutations, actions,
//! getters). Keeping the tables separate removes the whole class of
//! cross-table name collisions; a mutation and an action may share a local
//! key without any reserved-prefix machinery.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde_json::Value;

use crate::reactive::{Computed, ReactiveState};

use super::descriptor::{ActionFn, GetterFn, ModuleDescriptor, MutationFn};
use super::store::Store;

/// One getter: its body plus the cached computed cell that memoizes it.
pub(crate) struct GetterSlot {
    pub(crate) body: GetterFn,
    pub(crate) cell: Computed,
}

/// The materialized runtime form of a module descriptor.
///
/// Instances are immutable after construction apart from the state value
/// behind [`ReactiveState`]; the registry swaps whole instances in and out,
/// never mutates their tables.
pub struct ModuleInstance {
    /// Slash-joined registration path (`"a"`, `"a/b"`); empty for the root.
    pub(crate) path: String,
    /// Effective namespace: the names of namespaced ancestors including this
    /// module itself, slash-joined. Empty when nothing on the chain is
    /// namespaced — such modules answer to bare keys.
    pub(crate) namespace: String,
    pub(crate) namespaced: bool,
    pub(crate) state: ReactiveState,
    pub(crate) mutations: HashMap<String, MutationFn>,
    pub(crate) actions: HashMap<String, ActionFn>,
    pub(crate) getters: HashMap<String, GetterSlot>,
}

impl ModuleInstance {
    /// Materialize a descriptor subtree into instances, parent first, then
    /// children in declaration order. Every level gets its own
    /// [`ReactiveState`] tracked by the shared store version counter.
    pub(crate) fn materialize(
        descriptor: ModuleDescriptor,
        path: String,
        parent_namespace: &str,
        version: &Arc<AtomicU64>,
    ) -> Vec<Arc<ModuleInstance>> {
        let name = path.rsplit('/').next().unwrap_or("").to_string();
        // The root path is empty and the root is never namespaced.
        let namespace = if path.is_empty() || !descriptor.namespaced {
            parent_namespace.to_string()
        } else {
            join_path(parent_namespace, &name)
        };

        let getters = descriptor
            .getters
            .into_iter()
            .map(|(key, body)| {
                (
                    key,
                    GetterSlot {
                        body,
                        cell: Computed::new(version.clone()),
                    },
                )
            })
            .collect();

        let instance = Arc::new(ModuleInstance {
            path: path.clone(),
            namespace: namespace.clone(),
            namespaced: descriptor.namespaced,
            state: ReactiveState::new(descriptor.state, version.clone()),
            mutations: descriptor.mutations,
            actions: descriptor.actions,
            getters,
        });

        let mut out = vec![instance];
        for (child_name, child) in descriptor.submodules {
            let child_path = join_path(&path, &child_name);
            out.extend(Self::materialize(child, child_path, &namespace, version));
        }
        out
    }

    /// The exposed name for a local getter key: `namespace/key` when the
    /// module has a namespace, the bare key otherwise.
    pub(crate) fn exposed_getter_name(&self, local: &str) -> String {
        join_path(&self.namespace, local)
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("path", &self.path)
            .field("namespace", &self.namespace)
            .field("namespaced", &self.namespaced)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Join two slash paths, tolerating an empty left side.
pub(crate) fn join_path(left: &str, right: &str) -> String {
    if left.is_empty() {
        right.to_string()
    } else {
        format!("{left}/{right}")
    }
}

/// Read-only handle to a registered module, returned by
/// [`Store::get_module`](super::store::Store::get_module).
#[derive(Clone)]
pub struct ModuleHandle {
    pub(crate) store: Store,
    pub(crate) instance: Arc<ModuleInstance>,
}

impl ModuleHandle {
    /// Registration path of the module.
    pub fn path(&self) -> &str {
        &self.instance.path
    }

    /// Effective namespace; empty for modules reachable by bare keys.
    pub fn namespace(&self) -> &str {
        &self.instance.namespace
    }

    pub fn namespaced(&self) -> bool {
        self.instance.namespaced
    }

    /// Snapshot of the module's own state, with any registered descendant
    /// module state nested under its name.
    pub fn state(&self) -> Value {
        self.store.state_of(&self.instance.path)
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("path", &self.instance.path)
            .field("namespace", &self.instance.namespace)
            .finish()
    }
}
