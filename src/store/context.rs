//! Context values handed to user callables and observers.
//!
//! Every callable a module registers receives an explicit context value
//! instead of capturing store internals: getters get a [`GetterContext`],
//! actions get an [`ActionContext`] pre-curried with their module's
//! namespace, and subscribers/watchers read through [`StateView`] and
//! [`GetterView`]. Root access is part of the context from construction —
//! eagerly and immutably, never patched in after the fact.

use serde_json::Value;

use crate::error::Result;

use super::module::{join_path, ModuleInstance};
use super::router::CallOptions;
use super::store::{Store, StoreInner};

// ---------------------------------------------------------------------------
// GetterContext
// ---------------------------------------------------------------------------

/// The argument to a getter body: the module's own state and getters plus
/// the root's, as explicit accessors.
pub struct GetterContext<'a> {
    pub(crate) store: &'a StoreInner,
    pub(crate) module: &'a ModuleInstance,
}

impl GetterContext<'_> {
    /// Snapshot of the owning module's own state.
    pub fn state(&self) -> Value {
        self.module.state.snapshot()
    }

    /// One top-level property of the owning module's state, `Null` if absent.
    pub fn get(&self, key: &str) -> Value {
        self.module.state.get(key)
    }

    /// Read a sibling getter by local name, resolved inside this module's
    /// namespace.
    pub fn getter(&self, name: &str) -> Option<Value> {
        self.store
            .read_getter(&join_path(&self.module.namespace, name))
    }

    /// Snapshot of the root module's own state.
    pub fn root_state(&self) -> Value {
        self.store.root.state.snapshot()
    }

    /// Read any getter by its fully qualified exposed name.
    pub fn root_getter(&self, name: &str) -> Option<Value> {
        self.store.read_getter(name)
    }
}

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// The argument to an action body.
///
/// `commit` and `dispatch` are pre-curried with the owning module's
/// namespace: a bare name used inside the action resolves to this module
/// unless the call carries the root-override flag. The context is cheap to
/// clone and `'static`, so action futures may move it freely.
#[derive(Clone)]
pub struct ActionContext {
    pub(crate) store: Store,
    pub(crate) module_path: String,
    pub(crate) namespace: String,
}

impl ActionContext {
    /// Commit a mutation, resolving bare names against this module.
    pub fn commit(&self, name: &str, payload: impl Into<Option<Value>>) -> Result<()> {
        self.commit_with(name, payload, CallOptions::default())
    }

    /// Commit with explicit options; `CallOptions::root()` bypasses this
    /// module's namespace and targets the root instance.
    pub fn commit_with(
        &self,
        name: &str,
        payload: impl Into<Option<Value>>,
        options: CallOptions,
    ) -> Result<()> {
        self.store
            .commit_with(name, payload, self.curry(options))
    }

    /// Dispatch an action, resolving bare names against this module.
    pub async fn dispatch(&self, name: &str, payload: impl Into<Option<Value>>) -> Result<Value> {
        self.dispatch_with(name, payload, CallOptions::default()).await
    }

    /// Dispatch with explicit options; `CallOptions::root()` bypasses this
    /// module's namespace and targets the root instance.
    pub async fn dispatch_with(
        &self,
        name: &str,
        payload: impl Into<Option<Value>>,
        options: CallOptions,
    ) -> Result<Value> {
        self.store
            .dispatch_with(name, payload, self.curry(options))
            .await
    }

    /// Snapshot of this module's own state (registered descendants nested).
    pub fn state(&self) -> Value {
        self.store.state_of(&self.module_path)
    }

    /// Read a getter by local name inside this module's namespace.
    pub fn getter(&self, name: &str) -> Option<Value> {
        self.store
            .inner
            .read_getter(&join_path(&self.namespace, name))
    }

    /// Snapshot of the root module's own state.
    pub fn root_state(&self) -> Value {
        self.store.inner.root.state.snapshot()
    }

    /// Read any getter by its fully qualified exposed name.
    pub fn root_getter(&self, name: &str) -> Option<Value> {
        self.store.inner.read_getter(name)
    }

    /// The store handle itself, for re-entrant operations that should not be
    /// curried (dynamic registration from inside an action, for example).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Apply this module's namespace to a call unless the caller overrode
    /// the routing explicitly.
    fn curry(&self, mut options: CallOptions) -> CallOptions {
        if !options.root && options.module.is_none() && !self.namespace.is_empty() {
            options.module = Some(self.namespace.clone());
        }
        options
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("module_path", &self.module_path)
            .field("namespace", &self.namespace)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

/// Live read view over the state tree.
///
/// Indexing by a registered module name yields that module's own state;
/// any other key reads the root state's property. The view holds the store
/// handle, so it stays correct across dynamic (re)registration without the
/// consumer re-acquiring it.
#[derive(Clone)]
pub struct StateView {
    pub(crate) store: Store,
}

impl StateView {
    /// Resolve one key: a registered module path yields that module's state
    /// snapshot (descendants nested), anything else reads the root state's
    /// property. Absent keys are `Null`.
    pub fn get(&self, key: &str) -> Value {
        if self.store.inner.module_by_path(key).is_some() {
            self.store.state_of(key)
        } else {
            self.store.inner.root.state.get(key)
        }
    }

    /// Snapshot of the entire nested state tree.
    pub fn snapshot(&self) -> Value {
        self.store.state_snapshot()
    }
}

impl std::fmt::Debug for StateView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateView").finish_non_exhaustive()
    }
}

/// Live read view over the flat getter surface, supporting both bare and
/// `module/name` keys. Missing keys read as `None`, never a panic, so
/// consumers can read optimistically before a lazily-registered module
/// mounts.
#[derive(Clone)]
pub struct GetterView {
    pub(crate) store: Store,
}

impl GetterView {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.store.inner.read_getter(name)
    }
}

impl std::fmt::Debug for GetterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetterView").finish_non_exhaustive()
    }
}
