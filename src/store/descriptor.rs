//! Declarative module descriptors.
//!
//! A [`ModuleDescriptor`] is pure data plus callables: it describes a module's
//! initial state, its mutation/action/getter tables, whether it is
//! namespaced, and its submodules. The store materializes a descriptor into a
//! live [`ModuleInstance`](super::module::ModuleInstance) at registration.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use super::context::{ActionContext, GetterContext};

/// A registered, strictly synchronous state-write function.
///
/// Receives the owning module's state and the commit payload.
pub type MutationFn = Arc<dyn Fn(&mut Value, Option<Value>) + Send + Sync>;

/// The boxed future returned by an action body.
pub type ActionFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// A registered action function, sync or async.
///
/// Receives an [`ActionContext`] whose `commit`/`dispatch` are pre-curried
/// with the owning module's namespace, plus the dispatch payload.
pub type ActionFn = Arc<dyn Fn(ActionContext, Option<Value>) -> ActionFuture + Send + Sync>;

/// A registered, lazily-cached derived read function.
///
/// Receives a [`GetterContext`] exposing the module's own state and getters
/// alongside the root's.
pub type GetterFn = Arc<dyn Fn(&GetterContext<'_>) -> Value + Send + Sync>;

/// Declarative record for one module: state, mutations, actions, getters,
/// namespacing, and submodules.
///
/// Built fluently:
///
/// ```
/// use fluxor::store::ModuleDescriptor;
/// use serde_json::json;
///
/// let counter = ModuleDescriptor::new()
///     .state(json!({ "count": 0 }))
///     .mutation("inc", |state, _payload| {
///         state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
///     })
///     .getter("count", |ctx| ctx.state()["count"].clone())
///     .namespaced(true);
/// ```
#[derive(Clone, Default)]
pub struct ModuleDescriptor {
    pub(crate) state: Value,
    pub(crate) mutations: HashMap<String, MutationFn>,
    pub(crate) actions: HashMap<String, ActionFn>,
    pub(crate) getters: HashMap<String, GetterFn>,
    pub(crate) namespaced: bool,
    /// Submodules in declaration order; order is observable through bare-key
    /// dispatch, so a plain map will not do.
    pub(crate) submodules: Vec<(String, ModuleDescriptor)>,
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module's initial state. Defaults to `Null`; an object is
    /// expected whenever property reads or submodule nesting are used.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Register a mutation under a local key. Within one module a key maps to
    /// a single mutation; mutations, actions, and getters live in separate
    /// tables, so a mutation and an action may share a name freely.
    pub fn mutation<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Value, Option<Value>) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(f));
        self
    }

    /// Register an action under a local key. The closure may return any
    /// future; it is boxed here so descriptors stay object-safe.
    pub fn action<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let wrapped: ActionFn = Arc::new(move |ctx, payload| Box::pin(f(ctx, payload)));
        self.actions.insert(name.into(), wrapped);
        self
    }

    /// Register a getter under a local key.
    pub fn getter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&GetterContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(f));
        self
    }

    /// Mark this module's keys as reachable only through `module/key`
    /// qualified calls, never through bare keys.
    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    /// Attach a submodule under `name`. Registration order is preserved.
    pub fn module(mut self, name: impl Into<String>, descriptor: ModuleDescriptor) -> Self {
        self.submodules.push((name.into(), descriptor));
        self
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("state", &self.state)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("namespaced", &self.namespaced)
            .field(
                "submodules",
                &self.submodules.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_keeps_tables_separate() {
        let desc = ModuleDescriptor::new()
            .state(json!({"n": 0}))
            .mutation("load", |_, _| {})
            .action("load", |_, _| async { Ok(json!(null)) })
            .getter("load", |_| json!(1));

        assert!(desc.mutations.contains_key("load"));
        assert!(desc.actions.contains_key("load"));
        assert!(desc.getters.contains_key("load"));
    }

    #[test]
    fn test_submodule_order_is_preserved() {
        let desc = ModuleDescriptor::new()
            .module("b", ModuleDescriptor::new())
            .module("a", ModuleDescriptor::new());
        let names: Vec<_> = desc.submodules.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
