//! Tracked mutable state container.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

/// A mutable state container tracked by a store-wide version counter.
///
/// Each module owns exactly one `ReactiveState`, created when the module is
/// registered and never replaced while the module is live. Mutations write
/// through it in place via [`write`](Self::write); every write bumps the
/// shared version counter so dependent [`Computed`](super::Computed) caches
/// know to re-evaluate.
pub struct ReactiveState {
    data: RwLock<Value>,
    version: Arc<AtomicU64>,
}

impl ReactiveState {
    /// Create a container holding `initial`, tracked by the given shared
    /// version counter.
    pub fn new(initial: Value, version: Arc<AtomicU64>) -> Self {
        Self {
            data: RwLock::new(initial),
            version,
        }
    }

    /// Clone the current value.
    pub fn snapshot(&self) -> Value {
        self.data.read().clone()
    }

    /// Read a single top-level property, `Null` when absent or when the
    /// state is not an object.
    pub fn get(&self, key: &str) -> Value {
        self.data.read().get(key).cloned().unwrap_or(Value::Null)
    }

    /// Apply a mutation to the state in place and bump the version counter.
    ///
    /// The write lock is held only for the duration of `f`; the version bump
    /// happens after the lock is released.
    pub fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let out = {
            let mut guard = self.data.write();
            f(&mut guard)
        };
        self.version.fetch_add(1, Ordering::SeqCst);
        out
    }

    /// Current value of the shared version counter.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ReactiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveState")
            .field("data", &*self.data.read())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_bumps_shared_version() {
        let version = Arc::new(AtomicU64::new(0));
        let a = ReactiveState::new(json!({"n": 0}), version.clone());
        let b = ReactiveState::new(json!({"n": 0}), version.clone());

        a.write(|s| s["n"] = json!(1));
        assert_eq!(version.load(Ordering::SeqCst), 1);
        b.write(|s| s["n"] = json!(2));
        assert_eq!(version.load(Ordering::SeqCst), 2);

        assert_eq!(a.get("n"), json!(1));
        assert_eq!(b.get("n"), json!(2));
    }

    #[test]
    fn test_get_missing_key_is_null() {
        let state = ReactiveState::new(json!({"x": 1}), Arc::new(AtomicU64::new(0)));
        assert_eq!(state.get("y"), Value::Null);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let state = ReactiveState::new(json!({"n": 0}), Arc::new(AtomicU64::new(0)));
        let snap = state.snapshot();
        state.write(|s| s["n"] = json!(5));
        assert_eq!(snap["n"], json!(0));
        assert_eq!(state.get("n"), json!(5));
    }
}
