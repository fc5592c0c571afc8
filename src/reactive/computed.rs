//! Lazily re-evaluated cached values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// A cached derived value invalidated by the store-wide version counter.
///
/// `Computed` does not own the evaluation closure; the caller supplies it on
/// every read via [`get_or_eval`](Self::get_or_eval). The cell only decides
/// whether the closure needs to run: it runs at most once per version
/// advance, and never while the version is unchanged, regardless of how many
/// reads happen in between.
pub struct Computed {
    version: Arc<AtomicU64>,
    cache: Mutex<Option<(u64, Value)>>,
}

impl Computed {
    /// Create an empty cell tracked by the given shared version counter.
    pub fn new(version: Arc<AtomicU64>) -> Self {
        Self {
            version,
            cache: Mutex::new(None),
        }
    }

    /// Return the cached value if it is current, otherwise run `eval`, cache
    /// its result under the current version, and return it.
    ///
    /// The cache lock is never held while `eval` runs, so an evaluation may
    /// read other `Computed` cells (getters reading getters) without
    /// deadlocking.
    pub fn get_or_eval(&self, eval: impl FnOnce() -> Value) -> Value {
        let current = self.version.load(Ordering::SeqCst);
        if let Some((cached_version, cached)) = self.cache.lock().clone() {
            if cached_version == current {
                return cached;
            }
        }
        let value = eval();
        *self.cache.lock() = Some((current, value.clone()));
        value
    }
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.cache.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_evaluates_once_per_version() {
        let version = Arc::new(AtomicU64::new(0));
        let cell = Computed::new(version.clone());
        let runs = AtomicUsize::new(0);

        let eval = || {
            runs.fetch_add(1, Ordering::SeqCst);
            json!(42)
        };

        assert_eq!(cell.get_or_eval(eval), json!(42));
        assert_eq!(cell.get_or_eval(eval), json!(42));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        version.fetch_add(1, Ordering::SeqCst);
        assert_eq!(cell.get_or_eval(eval), json!(42));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nested_evaluation_does_not_deadlock() {
        let version = Arc::new(AtomicU64::new(0));
        let outer = Computed::new(version.clone());
        let inner = Computed::new(version);

        let result = outer.get_or_eval(|| {
            let base = inner.get_or_eval(|| json!(2));
            json!(base.as_i64().unwrap() * 10)
        });
        assert_eq!(result, json!(20));
    }
}
