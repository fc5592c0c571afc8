//! Store errors.

use thiserror::Error;

/// Errors produced by the store engine.
///
/// Lookup helpers (`has_module`, `get_module`, getter reads) never error;
/// they return `false`/`None` for unknown names. Errors are reserved for the
/// cases where silence would mask a typo as dead code.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A slash-qualified commit/dispatch named a module namespace that is not
    /// currently registered.
    #[error("unknown module namespace: {path}")]
    UnknownModule { path: String },

    /// `register_module` targeted a path that is already live.
    #[error("module already registered: {path}")]
    DuplicateModule { path: String },

    /// `register_module` targeted a nested path whose parent does not exist.
    #[error("parent module not registered: {path}")]
    MissingParent { path: String },

    /// A user-supplied action body failed. Propagates out of `dispatch` as-is;
    /// the engine performs no retry and no implicit logging.
    #[error("action failed: {0}")]
    Action(#[from] anyhow::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
