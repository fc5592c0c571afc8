//! The store engine: module descriptors and instances, the namespace
//! router, the flat getter surface, dynamic module lifecycle, and the
//! subscription bus.

pub mod context;
pub mod descriptor;
mod getters;
pub mod install;
pub mod module;
pub mod router;
pub mod store;
pub mod subscription;

pub use context::{ActionContext, GetterContext, GetterView, StateView};
pub use descriptor::{ActionFn, ActionFuture, GetterFn, ModuleDescriptor, MutationFn};
pub use install::StoreRegistry;
pub use module::ModuleHandle;
pub use router::CallOptions;
pub use store::Store;
pub use subscription::{ActionRecord, MutationRecord, SubscriptionId, WatchId};
