//! Subscription bus: mutation/action subscribers and state watchers.
//!
//! Delivery is deferred to the next scheduler flush, never synchronous
//! inside the triggering commit. Subscriber notification iterates a snapshot
//! of the list and re-checks liveness per callback, so a subscriber that
//! unsubscribes itself mid-notification receives that notification exactly
//! once while its siblings still receive theirs exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::context::{GetterView, StateView};
use super::store::Store;

/// Identifier for a mutation or action subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

/// Record describing one committed mutation cycle.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Fully qualified mutation type as resolved by the router.
    pub name: String,
    pub payload: Option<Value>,
}

/// Record describing one settled dispatch cycle.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// Fully qualified action type as resolved by the router.
    pub name: String,
    pub payload: Option<Value>,
}

pub(crate) type MutationSubscriberFn = Arc<dyn Fn(&MutationRecord, &StateView) + Send + Sync>;
pub(crate) type ActionSubscriberFn = Arc<dyn Fn(&ActionRecord, &StateView) + Send + Sync>;
pub(crate) type WatchSourceFn = Arc<dyn Fn(&StateView, &GetterView) -> Value + Send + Sync>;
pub(crate) type WatchCallbackFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

pub(crate) struct WatchEntry {
    id: WatchId,
    source: WatchSourceFn,
    callback: WatchCallbackFn,
    last: Mutex<Value>,
}

pub(crate) struct SubscriptionBus {
    next_id: AtomicU64,
    mutation_subs: Mutex<Vec<(SubscriptionId, MutationSubscriberFn)>>,
    action_subs: Mutex<Vec<(SubscriptionId, ActionSubscriberFn)>>,
    watchers: Mutex<Vec<Arc<WatchEntry>>>,
    /// Set while a watcher-flush job is queued; coalesces a multi-commit
    /// burst into a single evaluation per watcher.
    pub(crate) watch_flush_pending: AtomicBool,
}

impl SubscriptionBus {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            mutation_subs: Mutex::new(Vec::new()),
            action_subs: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
            watch_flush_pending: AtomicBool::new(false),
        }
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn subscribe(&self, callback: MutationSubscriberFn) -> SubscriptionId {
        let id = SubscriptionId(self.fresh_id());
        self.mutation_subs.lock().push((id, callback));
        id
    }

    pub(crate) fn subscribe_action(&self, callback: ActionSubscriberFn) -> SubscriptionId {
        let id = SubscriptionId(self.fresh_id());
        self.action_subs.lock().push((id, callback));
        id
    }

    /// Remove a subscriber of either kind. Idempotent.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        {
            let mut subs = self.mutation_subs.lock();
            let before = subs.len();
            subs.retain(|(sub_id, _)| *sub_id != id);
            removed |= subs.len() != before;
        }
        {
            let mut subs = self.action_subs.lock();
            let before = subs.len();
            subs.retain(|(sub_id, _)| *sub_id != id);
            removed |= subs.len() != before;
        }
        removed
    }

    pub(crate) fn watch(
        &self,
        source: WatchSourceFn,
        callback: WatchCallbackFn,
        initial: Value,
    ) -> WatchId {
        let id = WatchId(self.fresh_id());
        self.watchers.lock().push(Arc::new(WatchEntry {
            id,
            source,
            callback,
            last: Mutex::new(initial),
        }));
        id
    }

    pub(crate) fn unwatch(&self, id: WatchId) -> bool {
        let mut watchers = self.watchers.lock();
        let before = watchers.len();
        watchers.retain(|entry| entry.id != id);
        watchers.len() != before
    }

    /// Deliver one mutation record to every live subscriber.
    ///
    /// The list lock is never held while a callback runs, so callbacks may
    /// subscribe or unsubscribe re-entrantly.
    pub(crate) fn notify_mutation(&self, store: &Store, record: &MutationRecord) {
        let view = StateView {
            store: store.clone(),
        };
        let ids: Vec<SubscriptionId> =
            self.mutation_subs.lock().iter().map(|(id, _)| *id).collect();
        for id in ids {
            let callback = self
                .mutation_subs
                .lock()
                .iter()
                .find(|(sub_id, _)| *sub_id == id)
                .map(|(_, cb)| cb.clone());
            if let Some(callback) = callback {
                callback(record, &view);
            }
        }
    }

    /// Deliver one action record to every live subscriber.
    pub(crate) fn notify_action(&self, store: &Store, record: &ActionRecord) {
        let view = StateView {
            store: store.clone(),
        };
        let ids: Vec<SubscriptionId> =
            self.action_subs.lock().iter().map(|(id, _)| *id).collect();
        for id in ids {
            let callback = self
                .action_subs
                .lock()
                .iter()
                .find(|(sub_id, _)| *sub_id == id)
                .map(|(_, cb)| cb.clone());
            if let Some(callback) = callback {
                callback(record, &view);
            }
        }
    }

    /// Re-evaluate every live watcher once and fire callbacks for those
    /// whose value is distinct from the last delivered one.
    pub(crate) fn flush_watchers(&self, store: &Store) {
        let entries: Vec<Arc<WatchEntry>> = self.watchers.lock().clone();
        let state_view = StateView {
            store: store.clone(),
        };
        let getter_view = GetterView {
            store: store.clone(),
        };

        for entry in entries {
            // Liveness re-check: an earlier callback may have unwatched it.
            if !self.watchers.lock().iter().any(|e| e.id == entry.id) {
                continue;
            }
            let new = (entry.source)(&state_view, &getter_view);
            let old = {
                let mut last = entry.last.lock();
                if *last == new {
                    None
                } else {
                    Some(std::mem::replace(&mut *last, new.clone()))
                }
            };
            if let Some(old) = old {
                (entry.callback)(&new, &old);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ModuleDescriptor, Store};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;

    fn counter_store() -> Store {
        Store::new(
            ModuleDescriptor::new()
                .state(json!({"count": 0}))
                .mutation("inc", |state, _| {
                    state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
                })
                .mutation("touch", |_, _| {}),
        )
        .unwrap()
    }

    #[test]
    fn test_subscriber_sees_record_and_post_commit_state() {
        let store = counter_store();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        store.subscribe(move |record, state| {
            log.lock().push((record.name.clone(), state.get("count")));
        });

        store.commit("inc", json!({"by": 1})).unwrap();
        assert!(seen.lock().is_empty(), "delivery must not be synchronous");

        store.flush();
        assert_eq!(*seen.lock(), vec![("inc".to_string(), json!(1))]);
    }

    #[test]
    fn test_self_unsubscribing_subscriber() {
        let store = counter_store();
        let self_hits = Arc::new(AtomicUsize::new(0));
        let sibling_hits = Arc::new(AtomicUsize::new(0));
        let own_id: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());

        let id = store.subscribe({
            let store = store.clone();
            let hits = self_hits.clone();
            let own_id = own_id.clone();
            move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.get() {
                    store.unsubscribe(*id);
                }
            }
        });
        own_id.set(id).ok();

        let sibling = sibling_hits.clone();
        store.subscribe(move |_, _| {
            sibling.fetch_add(1, Ordering::SeqCst);
        });

        store.commit("inc", None).unwrap();
        store.flush();
        store.commit("inc", None).unwrap();
        store.flush();

        assert_eq!(self_hits.load(Ordering::SeqCst), 1);
        assert_eq!(sibling_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let store = counter_store();
        let id = store.subscribe(|_, _| {});
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_action_subscriber_notified_after_settle() {
        let store = Store::new(
            ModuleDescriptor::new().action("load", |_, _| async { Ok(json!("ready")) }),
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        store.subscribe_action(move |record, _| {
            log.lock().push(record.name.clone());
        });

        store.dispatch("load", None).await.unwrap();
        store.next_tick().await;
        assert_eq!(*seen.lock(), vec!["load".to_string()]);
    }

    #[test]
    fn test_watch_fires_once_per_distinct_value_and_coalesces() {
        let store = counter_store();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let log = fired.clone();
        store.watch(
            |state, _| state.get("count"),
            move |new, old| {
                log.lock().push((new.clone(), old.clone()));
            },
        );

        // Two commits in one synchronous burst.
        store.commit("inc", None).unwrap();
        store.commit("inc", None).unwrap();
        assert!(fired.lock().is_empty(), "never synchronous");
        store.flush();
        assert_eq!(*fired.lock(), vec![(json!(2), json!(0))]);

        // A commit that leaves the watched value unchanged stays silent.
        store.commit("touch", None).unwrap();
        store.flush();
        assert_eq!(fired.lock().len(), 1);
    }

    #[test]
    fn test_watch_can_read_getters() {
        let store = Store::new(
            ModuleDescriptor::new()
                .state(json!({"n": 1}))
                .mutation("double", |state, _| {
                    state["n"] = json!(state["n"].as_i64().unwrap_or(0) * 2);
                })
                .getter("n", |ctx| ctx.get("n")),
        )
        .unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let hits = fired.clone();
        store.watch(
            |_, getters| getters.get("n").unwrap_or(Value::Null),
            move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.commit("double", None).unwrap();
        store.flush();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwatch_stops_delivery() {
        let store = counter_store();
        let fired = Arc::new(AtomicUsize::new(0));
        let hits = fired.clone();
        let id = store.watch(
            |state, _| state.get("count"),
            move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(store.unwatch(id));
        assert!(!store.unwatch(id));
        store.commit("inc", None).unwrap();
        store.flush();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_next_tick_delivers_on_runtime() {
        let store = counter_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        store.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.commit("inc", None).unwrap();
        store.next_tick().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
