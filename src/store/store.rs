//! The store facade: construction, commit/dispatch, getter and state
//! surfaces, subscriptions, and dynamic module lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::reactive::Scheduler;

use super::context::{ActionContext, GetterView, StateView};
use super::descriptor::ModuleDescriptor;
use super::getters::GetterAggregator;
use super::module::{ModuleHandle, ModuleInstance};
use super::router::{self, CallOptions, TargetKind};
use super::subscription::{
    ActionRecord, MutationRecord, SubscriptionBus, SubscriptionId, WatchId,
};

/// Shared engine internals behind the cheap-to-clone [`Store`] handle.
pub(crate) struct StoreInner {
    /// Store-wide version counter: bumped by every committed write and by
    /// every registry change. Drives `Computed` cache invalidation.
    pub(crate) version: Arc<AtomicU64>,
    pub(crate) root: Arc<ModuleInstance>,
    /// Live modules in registration order. Order is observable: bare-key
    /// calls invoke matches in this order.
    pub(crate) registry: RwLock<Vec<Arc<ModuleInstance>>>,
    pub(crate) getters: GetterAggregator,
    pub(crate) bus: SubscriptionBus,
    pub(crate) scheduler: Arc<Scheduler>,
}

impl StoreInner {
    pub(crate) fn module_by_path(&self, path: &str) -> Option<Arc<ModuleInstance>> {
        self.registry
            .read()
            .iter()
            .find(|m| m.path == path)
            .cloned()
    }

    /// Modules whose effective namespace equals `namespace`, in registration
    /// order. The root (empty namespace) is never part of a qualified match.
    pub(crate) fn modules_in_namespace(&self, namespace: &str) -> Vec<Arc<ModuleInstance>> {
        self.registry
            .read()
            .iter()
            .filter(|m| m.namespace == namespace)
            .cloned()
            .collect()
    }

    pub(crate) fn read_getter(&self, name: &str) -> Option<Value> {
        self.getters.read(self, name)
    }

    /// Snapshot of one module's state with registered descendants nested
    /// under their names. The empty path yields the full tree.
    pub(crate) fn state_of(&self, path: &str) -> Value {
        if path.is_empty() {
            return self.state_snapshot();
        }
        let Some(module) = self.module_by_path(path) else {
            return Value::Null;
        };
        let mut tree = module.state.snapshot();
        let prefix = format!("{path}/");
        for descendant in self.registry.read().iter() {
            if let Some(relative) = descendant.path.strip_prefix(prefix.as_str()) {
                let segments: Vec<&str> = relative.split('/').collect();
                insert_at(&mut tree, &segments, descendant.state.snapshot());
            }
        }
        tree
    }

    pub(crate) fn state_snapshot(&self) -> Value {
        let mut tree = self.root.state.snapshot();
        for module in self.registry.read().iter() {
            let segments: Vec<&str> = module.path.split('/').collect();
            insert_at(&mut tree, &segments, module.state.snapshot());
        }
        tree
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

/// Nest `value` into `tree` at the given path segments, creating
/// intermediate objects as needed. Non-object intermediates are left alone.
fn insert_at(tree: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = tree;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if let Value::Object(map) = cursor {
        map.insert(last.to_string(), value);
    }
}

/// A modular, reactive state store.
///
/// Holds a tree of module state, exposes lazily-cached getters, and routes
/// two write entry points — synchronous [`commit`](Store::commit) and
/// asynchronous [`dispatch`](Store::dispatch) — through a namespace router.
/// Modules can be registered and unregistered at runtime without
/// invalidating state held by unrelated modules.
///
/// `Store` is a cheap handle; clones share the same engine.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Build a store from a root descriptor. The descriptor's submodules are
    /// registered in declaration order; their names must be unique.
    pub fn new(descriptor: ModuleDescriptor) -> Result<Self> {
        let version = Arc::new(AtomicU64::new(0));

        let mut root_descriptor = descriptor;
        let submodules = std::mem::take(&mut root_descriptor.submodules);
        let mut roots =
            ModuleInstance::materialize(root_descriptor, String::new(), "", &version);
        let root = roots.remove(0);

        let inner = Arc::new(StoreInner {
            version,
            root,
            registry: RwLock::new(Vec::new()),
            getters: GetterAggregator::new(),
            bus: SubscriptionBus::new(),
            scheduler: Scheduler::new(),
        });
        inner.getters.install_module(&inner.root);

        let store = Store { inner };
        for (name, submodule) in submodules {
            store.register_module(&name, submodule)?;
        }
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Commit / dispatch
    // -----------------------------------------------------------------------

    /// Commit a mutation synchronously: every matched mutation body has run
    /// by the time this returns, and the state reflects them immediately.
    /// Subscriber and watcher notifications are queued for the next flush.
    pub fn commit(&self, name: &str, payload: impl Into<Option<Value>>) -> Result<()> {
        self.commit_with(name, payload, CallOptions::default())
    }

    /// Commit with explicit routing options.
    ///
    /// A slash-qualified name whose namespace is unknown fails with
    /// [`StoreError::UnknownModule`]. A resolvable name matching no mutation
    /// logs a warning and is a no-op.
    pub fn commit_with(
        &self,
        name: &str,
        payload: impl Into<Option<Value>>,
        options: CallOptions,
    ) -> Result<()> {
        let payload = payload.into();
        let resolution = router::resolve(&self.inner, name, &options, TargetKind::Mutation)?;
        if resolution.targets.is_empty() {
            tracing::warn!(
                mutation = resolution.effective.as_str(),
                "no mutation registered for type"
            );
            return Ok(());
        }

        for module in &resolution.targets {
            if let Some(mutation) = module.mutations.get(&resolution.local) {
                module.state.write(|state| mutation(state, payload.clone()));
            }
        }

        self.queue_mutation_notice(MutationRecord {
            name: resolution.effective,
            payload,
        });
        Ok(())
    }

    /// Dispatch an action. Resolves to the single matched action's value,
    /// or to an ordered array of every matched action's value when a bare
    /// name matches several modules.
    pub async fn dispatch(
        &self,
        name: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<Value> {
        self.dispatch_with(name, payload, CallOptions::default()).await
    }

    /// Dispatch with explicit routing options.
    ///
    /// All matched action futures are driven to completion before the
    /// aggregate settles; a rejection does not cancel sibling work. If any
    /// action failed, the aggregate fails with the first error after every
    /// sibling has settled.
    pub async fn dispatch_with(
        &self,
        name: &str,
        payload: impl Into<Option<Value>>,
        options: CallOptions,
    ) -> Result<Value> {
        let payload = payload.into();
        let resolution = router::resolve(&self.inner, name, &options, TargetKind::Action)?;
        if resolution.targets.is_empty() {
            tracing::warn!(
                action = resolution.effective.as_str(),
                "no action registered for type"
            );
            return Ok(Value::Null);
        }

        let mut futures = Vec::with_capacity(resolution.targets.len());
        for module in &resolution.targets {
            if let Some(action) = module.actions.get(&resolution.local) {
                let ctx = ActionContext {
                    store: self.clone(),
                    module_path: module.path.clone(),
                    namespace: module.namespace.clone(),
                };
                futures.push(action(ctx, payload.clone()));
            }
        }

        let settled = join_all(futures).await;

        self.queue_action_notice(ActionRecord {
            name: resolution.effective,
            payload,
        });

        let mut results = Vec::with_capacity(settled.len());
        let mut first_error = None;
        for outcome in settled {
            match outcome {
                Ok(value) => results.push(value),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        if let Some(error) = first_error {
            return Err(StoreError::Action(error));
        }
        Ok(if results.len() == 1 {
            results.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(results)
        })
    }

    // -----------------------------------------------------------------------
    // Read surfaces
    // -----------------------------------------------------------------------

    /// Live read view over the state tree (see [`StateView`]).
    pub fn state(&self) -> StateView {
        StateView {
            store: self.clone(),
        }
    }

    /// Snapshot of one module's state by registration path, descendants
    /// nested. Unknown paths read as `Null`; the empty path is the full tree.
    pub fn state_of(&self, path: &str) -> Value {
        self.inner.state_of(path)
    }

    /// Snapshot of the entire nested state tree.
    pub fn state_snapshot(&self) -> Value {
        self.inner.state_snapshot()
    }

    /// Read one getter by exposed name (bare or `module/name`). Missing
    /// names read as `None`; cached values are reused until the next commit.
    pub fn getter(&self, name: &str) -> Option<Value> {
        self.inner.read_getter(name)
    }

    /// Live read view over the flat getter surface.
    pub fn getters(&self) -> GetterView {
        GetterView {
            store: self.clone(),
        }
    }

    /// Whether a getter is currently exposed under `name`.
    pub fn has_getter(&self, name: &str) -> bool {
        self.inner.getters.contains(name)
    }

    /// All currently exposed getter names, unordered.
    pub fn getter_names(&self) -> Vec<String> {
        self.inner.getters.names()
    }

    // -----------------------------------------------------------------------
    // Module lifecycle
    // -----------------------------------------------------------------------

    /// Register a module subtree at runtime. `name` may be a nested path
    /// (`"a/b"`) as long as the parent is live. The new state and getters
    /// are visible immediately; existing consumers keep their views.
    pub fn register_module(&self, name: &str, descriptor: ModuleDescriptor) -> Result<()> {
        if name.is_empty() || self.inner.module_by_path(name).is_some() {
            return Err(StoreError::DuplicateModule {
                path: name.to_string(),
            });
        }
        let parent_namespace = match name.rsplit_once('/') {
            Some((parent, _)) => {
                let parent_module = self.inner.module_by_path(parent).ok_or_else(|| {
                    StoreError::MissingParent {
                        path: parent.to_string(),
                    }
                })?;
                parent_module.namespace.clone()
            }
            None => String::new(),
        };

        let instances = ModuleInstance::materialize(
            descriptor,
            name.to_string(),
            &parent_namespace,
            &self.inner.version,
        );
        {
            let mut registry = self.inner.registry.write();
            registry.extend(instances.iter().cloned());
        }
        for instance in &instances {
            self.inner.getters.install_module(instance);
        }
        self.inner.bump_version();
        tracing::debug!(module = name, "registered module");
        Ok(())
    }

    /// Unregister a module and its entire subtree. Idempotent: an unknown
    /// name removes nothing and returns `false`. All of the subtree's getter
    /// entries are removed; reading them afterwards behaves as not-found.
    pub fn unregister_module(&self, name: &str) -> bool {
        let prefix = format!("{name}/");
        let removed: Vec<Arc<ModuleInstance>> = {
            let mut registry = self.inner.registry.write();
            let drained: Vec<Arc<ModuleInstance>> = registry.drain(..).collect();
            let (gone, keep): (Vec<_>, Vec<_>) = drained
                .into_iter()
                .partition(|m| m.path == name || m.path.starts_with(prefix.as_str()));
            registry.extend(keep);
            gone
        };
        if removed.is_empty() {
            return false;
        }
        for module in &removed {
            self.inner.getters.remove_owner(&module.path);
        }
        self.inner.bump_version();
        tracing::debug!(
            module = name,
            count = removed.len(),
            "unregistered module subtree"
        );
        true
    }

    /// Whether a module is registered at `path`. Never errors.
    pub fn has_module(&self, path: &str) -> bool {
        self.inner.module_by_path(path).is_some()
    }

    /// Read-only handle to a registered module, `None` for unknown paths.
    pub fn get_module(&self, path: &str) -> Option<ModuleHandle> {
        self.inner.module_by_path(path).map(|instance| ModuleHandle {
            store: self.clone(),
            instance,
        })
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Observe committed mutations. Delivery is deferred to the next flush.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&MutationRecord, &StateView) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(Arc::new(callback))
    }

    /// Observe settled dispatches. Delivery is deferred to the next flush.
    pub fn subscribe_action<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ActionRecord, &StateView) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe_action(Arc::new(callback))
    }

    /// Remove a subscriber of either kind. Idempotent; safe to call from
    /// inside the subscriber's own callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Watch a derived value. `callback(new, old)` fires once per distinct
    /// value produced by `source`, on flush — never synchronously inside the
    /// triggering commit. A burst of commits coalesces into one evaluation.
    pub fn watch<S, C>(&self, source: S, callback: C) -> WatchId
    where
        S: Fn(&StateView, &GetterView) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let source: super::subscription::WatchSourceFn = Arc::new(source);
        let initial = source(&self.state(), &self.getters());
        self.inner.bus.watch(source, Arc::new(callback), initial)
    }

    /// Stop a watcher. Idempotent.
    pub fn unwatch(&self, id: WatchId) -> bool {
        self.inner.bus.unwatch(id)
    }

    // -----------------------------------------------------------------------
    // Flushing
    // -----------------------------------------------------------------------

    /// Drain pending subscriber/watcher notifications synchronously.
    pub fn flush(&self) {
        self.inner.scheduler.flush();
    }

    /// Yield to the runtime, then drain any remaining notifications. Gives
    /// async tests and callers a deterministic "next tick" boundary.
    pub async fn next_tick(&self) {
        tokio::task::yield_now().await;
        self.inner.scheduler.flush();
    }

    // -----------------------------------------------------------------------
    // Notification queuing
    // -----------------------------------------------------------------------

    fn queue_mutation_notice(&self, record: MutationRecord) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let store = Store { inner };
                store.inner.bus.notify_mutation(&store, &record);
            }
        }));
        self.queue_watcher_flush();
    }

    fn queue_action_notice(&self, record: ActionRecord) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let store = Store { inner };
                store.inner.bus.notify_action(&store, &record);
            }
        }));
    }

    /// At most one watcher-flush job per burst.
    fn queue_watcher_flush(&self) {
        if !self
            .inner
            .bus
            .watch_flush_pending
            .swap(true, Ordering::AcqRel)
        {
            let weak = Arc::downgrade(&self.inner);
            self.inner.scheduler.schedule(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .bus
                        .watch_flush_pending
                        .store(false, Ordering::Release);
                    let store = Store { inner };
                    store.inner.bus.flush_watchers(&store);
                }
            }));
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field(
                "modules",
                &self
                    .inner
                    .registry
                    .read()
                    .iter()
                    .map(|m| m.path.clone())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
