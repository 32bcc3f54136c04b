// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Hook for observing host-function executions as they happen.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use st_tensor::DType;

use crate::registry::FunctionToken;

/// One host-function execution that returned, whether or not its results
/// converted.
#[derive(Clone, Debug, PartialEq)]
pub struct HostCallEvent {
    pub name: String,
    /// Registry token when the call ran inside a graph, `None` when eager.
    pub token: Option<FunctionToken>,
    pub stateful: bool,
    pub arg_shapes: Vec<Vec<usize>>,
    /// Declared output dtypes.
    pub output_dtypes: Vec<DType>,
    /// Number of values the function actually returned.
    pub returned: usize,
}

pub type HostCallObserver = Arc<dyn Fn(&HostCallEvent) + Send + Sync + 'static>;

static HOST_CALL_OBSERVER: OnceLock<RwLock<Option<HostCallObserver>>> = OnceLock::new();

thread_local! {
    static IN_OBSERVER_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Install (or clear) the process-wide observer, returning the previous one.
pub fn set_host_call_observer(observer: Option<HostCallObserver>) -> Option<HostCallObserver> {
    let lock = HOST_CALL_OBSERVER.get_or_init(|| RwLock::new(None));
    let mut slot = lock.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, observer)
}

/// Forwards `event` to the installed observer. Host calls made from inside
/// the observer are not reported again, and observer panics are swallowed.
pub fn emit_host_call(event: &HostCallEvent) {
    let Some(lock) = HOST_CALL_OBSERVER.get() else {
        return;
    };
    let observer = lock.read().unwrap_or_else(PoisonError::into_inner).clone();
    let Some(observer) = observer else {
        return;
    };

    let already_in_callback = IN_OBSERVER_CALLBACK.with(|flag| flag.replace(true));
    if already_in_callback {
        return;
    }

    let _ = catch_unwind(AssertUnwindSafe(|| observer(event)));

    IN_OBSERVER_CALLBACK.with(|flag| flag.set(false));
}
