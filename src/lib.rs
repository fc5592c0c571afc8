//! # fluxor
//!
//! A modular, reactive state store: a container holding a tree of
//! application state, derived read-only getters, and two write entry points
//! — synchronous **mutations** and asynchronous **actions** — organized into
//! a tree of **modules** that can be namespaced, nested, and registered or
//! unregistered at runtime.
//!
//! - State lives in [`serde_json::Value`] containers, one per module,
//!   tracked by a store-wide version counter.
//! - Getters are lazy and cached: a getter body runs at most once per
//!   committed change, no matter how often it is read in between.
//! - `commit` is strictly synchronous; `dispatch` always resolves through a
//!   future, and a bare name matching several modules settles all of them
//!   before the aggregate resolves.
//! - Subscriber and watcher notifications are deferred to the next
//!   scheduler flush, never delivered inside the triggering call stack.
//!
//! ```
//! use fluxor::{ModuleDescriptor, Store};
//! use serde_json::json;
//!
//! let store = Store::new(
//!     ModuleDescriptor::new()
//!         .state(json!({ "count": 0 }))
//!         .mutation("inc", |state, _| {
//!             state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .getter("doubled", |ctx| {
//!             json!(ctx.get("count").as_i64().unwrap_or(0) * 2)
//!         }),
//! )
//! .unwrap();
//!
//! store.commit("inc", None).unwrap();
//! assert_eq!(store.state().get("count"), json!(1));
//! assert_eq!(store.getter("doubled"), Some(json!(2)));
//! ```

pub mod error;
pub mod reactive;
pub mod store;

pub use error::StoreError;
pub use store::{
    ActionContext, ActionRecord, CallOptions, GetterContext, GetterView, ModuleDescriptor,
    ModuleHandle, MutationRecord, StateView, Store, StoreRegistry, SubscriptionId, WatchId,
};
