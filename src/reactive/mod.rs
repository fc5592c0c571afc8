//! Reactive primitives backing the store engine.
//!
//! The store layer consumes exactly three capabilities from this module and
//! assumes nothing else about how they are implemented:
//!
//! - [`ReactiveState`]: one mutable tracked container per module. Writes go
//!   through [`ReactiveState::write`], which bumps a store-wide version
//!   counter shared by every container in the same store.
//! - [`Computed`]: a lazily re-evaluated cached value. The cache is keyed by
//!   the shared version counter, so a derived value is recomputed at most
//!   once per committed change and never re-invoked between changes.
//! - [`Scheduler`]: a batched deferral queue. Notification work enqueued
//!   during a synchronous mutation burst runs on the next flush, never
//!   inside the triggering call stack.
//!
//! Granularity note: "dependency change" here means any committed write to
//! any container in the store. That is coarser than per-property tracking
//! but preserves the contract the store relies on — a cached value is never
//! stale, and is never recomputed while nothing has changed.

pub mod computed;
pub mod scheduler;
pub mod state;

pub use computed::Computed;
pub use scheduler::Scheduler;
pub use state::ReactiveState;
