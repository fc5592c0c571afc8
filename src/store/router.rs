//! Commit/dispatch target resolution.
//!
//! A call resolves to zero, one, or many module instances:
//!
//! 1. The root-override flag targets the root instance directly, bypassing
//!    all namespace logic.
//! 2. An explicit module routing (set by a module's curried context) prefixes
//!    the raw type with that module's namespace before path resolution, so a
//!    bare name used inside an action resolves to the action's own module.
//!    Explicit routing takes precedence over path-splitting of the raw type.
//! 3. A slash-qualified type splits on its last `/`; the prefix must match
//!    the effective namespace of at least one registered module or the call
//!    fails with [`StoreError::UnknownModule`] — never a silent no-op, since
//!    that would mask typos as dead code. Every module sharing the namespace
//!    and defining the local key is targeted (a non-namespaced child shares
//!    its namespaced parent's namespace).
//! 4. A bare type targets the root plus every empty-namespace module that
//!    defines it, in registration order.
//!
//! A resolvable namespace whose local key is undefined resolves to zero
//! targets; the caller decides between a warning no-op (commit) and a `Null`
//! resolution (dispatch).

use std::sync::Arc;

use crate::error::{Result, StoreError};

use super::module::{join_path, ModuleInstance};
use super::store::StoreInner;

/// Routing options for a commit or dispatch call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Invoke the entry on the root instance, bypassing namespaces.
    pub root: bool,
    /// Resolve the type inside this namespace. Set by a module's curried
    /// context; takes precedence over path-splitting of the raw type.
    pub module: Option<String>,
}

impl CallOptions {
    /// Options carrying the root-override flag.
    pub fn root() -> Self {
        Self {
            root: true,
            module: None,
        }
    }

    /// Options routing explicitly into the given namespace.
    pub fn in_module(namespace: impl Into<String>) -> Self {
        Self {
            root: false,
            module: Some(namespace.into()),
        }
    }
}

/// Which callable table a call resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    Mutation,
    Action,
}

/// The outcome of resolution: the fully qualified name (for notification
/// records), the local key, and the targeted instances in invocation order.
pub(crate) struct Resolution {
    pub(crate) effective: String,
    pub(crate) local: String,
    pub(crate) targets: Vec<Arc<ModuleInstance>>,
}

fn defines(module: &ModuleInstance, kind: TargetKind, key: &str) -> bool {
    match kind {
        TargetKind::Mutation => module.mutations.contains_key(key),
        TargetKind::Action => module.actions.contains_key(key),
    }
}

pub(crate) fn resolve(
    inner: &StoreInner,
    raw: &str,
    options: &CallOptions,
    kind: TargetKind,
) -> Result<Resolution> {
    if options.root {
        let targets = if defines(&inner.root, kind, raw) {
            vec![inner.root.clone()]
        } else {
            Vec::new()
        };
        return Ok(Resolution {
            effective: raw.to_string(),
            local: raw.to_string(),
            targets,
        });
    }

    let effective = match options.module.as_deref() {
        Some(namespace) if !namespace.is_empty() => join_path(namespace, raw),
        _ => raw.to_string(),
    };

    if let Some((namespace, local)) = effective.rsplit_once('/') {
        let in_namespace = inner.modules_in_namespace(namespace);
        if in_namespace.is_empty() {
            return Err(StoreError::UnknownModule {
                path: namespace.to_string(),
            });
        }
        let targets = in_namespace
            .into_iter()
            .filter(|m| defines(m, kind, local))
            .collect();
        Ok(Resolution {
            local: local.to_string(),
            effective,
            targets,
        })
    } else {
        // Bare name: root first, then empty-namespace modules in
        // registration order.
        let mut targets = Vec::new();
        if defines(&inner.root, kind, &effective) {
            targets.push(inner.root.clone());
        }
        for module in inner.registry.read().iter() {
            if module.namespace.is_empty() && defines(module, kind, &effective) {
                targets.push(module.clone());
            }
        }
        Ok(Resolution {
            local: effective.clone(),
            effective,
            targets,
        })
    }
}
