// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Token-keyed registry of host functions.
//!
//! Traced graphs never hold host closures directly. Each host-call node stores
//! a [`FunctionToken`] and the executor resolves it here at run time. Graphs
//! own [`Registration`] guards so their functions are released together with
//! the graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::trace;

use crate::bridge::HostFunction;

/// Handle naming a registered host function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionToken(u64);

impl FunctionToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FunctionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hostfn_{}", self.0)
    }
}

/// Registry mapping tokens to host functions.
pub struct FunctionRegistry {
    functions: RwLock<HashMap<FunctionToken, HostFunction>>,
    next_token: AtomicU64,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Stores `function` under a fresh token. Tokens are never reused.
    pub fn register(&self, function: HostFunction) -> FunctionToken {
        let token = FunctionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, function);
        trace!(%token, "registered host function");
        token
    }

    /// Registers `function` and returns a guard that unregisters it on drop.
    pub fn register_scoped(self: &Arc<Self>, function: HostFunction) -> Registration {
        let token = self.register(function);
        Registration {
            registry: Arc::clone(self),
            token,
        }
    }

    pub fn get(&self, token: FunctionToken) -> Option<HostFunction> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token)
            .cloned()
    }

    /// Removes `token`, returning whether it was present.
    pub fn unregister(&self, token: FunctionToken) -> bool {
        let removed = self
            .functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token)
            .is_some();
        if removed {
            trace!(%token, "unregistered host function");
        }
        removed
    }

    pub fn contains(&self, token: FunctionToken) -> bool {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered tokens in ascending order.
    pub fn tokens(&self) -> Vec<FunctionToken> {
        let mut tokens: Vec<_> = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        tokens.sort();
        tokens
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Keeps a host function registered for as long as it lives.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<FunctionRegistry>,
    token: FunctionToken,
}

impl Registration {
    pub fn token(&self) -> FunctionToken {
        self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.token);
    }
}

static GLOBAL_FUNCTION_REGISTRY: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();

/// Process-wide registry used by graphs that were not given their own.
pub fn global_function_registry() -> Arc<FunctionRegistry> {
    Arc::clone(GLOBAL_FUNCTION_REGISTRY.get_or_init(|| Arc::new(FunctionRegistry::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::HostReturn;
    use crate::host::HostValue;

    fn identity() -> HostFunction {
        HostFunction::host(|args: &[HostValue]| Ok(HostReturn::Single(args[0].clone())))
    }

    #[test]
    fn tokens_are_unique() {
        let registry = FunctionRegistry::new();
        let f = identity();
        let a = registry.register(f.clone());
        let b = registry.register(f);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tokens(), vec![a, b]);
        assert_eq!(a.to_string(), "hostfn_0");
    }

    #[test]
    fn scoped_registration_unregisters_on_drop() {
        let registry = Arc::new(FunctionRegistry::new());
        let guard = registry.register_scoped(identity());
        let token = guard.token();
        assert!(registry.contains(token));
        drop(guard);
        assert!(!registry.contains(token));
        assert!(registry.get(token).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_reports_absence() {
        let registry = FunctionRegistry::new();
        let token = registry.register(identity());
        assert!(registry.unregister(token));
        assert!(!registry.unregister(token));
    }
}
