// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use st_hostcall::telemetry::{init_tracing, set_host_call_observer, HostCallEvent};
use st_hostcall::{
    BridgeError, DType, Function, GraphBuilder, HostCall, HostCallConfig, HostReturn, HostValue,
    Symbol, Tensor,
};

/// Serialises tests that install the process-wide observer and collects the
/// events it receives until dropped.
struct Recorder {
    events: Arc<Mutex<Vec<HostCallEvent>>>,
    _lock: MutexGuard<'static, ()>,
}

impl Recorder {
    fn install() -> Self {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let lock = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let events: Arc<Mutex<Vec<HostCallEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        set_host_call_observer(Some(Arc::new(move |event: &HostCallEvent| {
            sink.lock().unwrap().push(event.clone());
        })));
        Self {
            events,
            _lock: lock,
        }
    }

    fn events(&self) -> Vec<HostCallEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        set_host_call_observer(None);
    }
}

#[test]
fn observer_sees_every_execution() {
    assert!(init_tracing());
    let recorder = Recorder::install();

    let negate = HostCall::host(
        |args: &[HostValue]| Ok(HostValue::from(0i64).sub(&args[0])?.into()),
        DType::I64,
    )
    .named("negate");
    negate.call(&[Tensor::scalar(4i64)]).unwrap();

    let traced = negate.clone();
    let f = Function::new("negate_twice", 1, move |g: &mut GraphBuilder, args: &[Symbol]| {
        let once = g.host_call(&traced, args)?;
        g.host_call(&traced, &once)
    })
    .with_config(HostCallConfig::default());
    let out = f.call(&[Tensor::scalar(4i64)]).unwrap();
    assert_eq!(out, vec![Tensor::scalar(4i64)]);

    set_host_call_observer(None);
    negate.call(&[Tensor::scalar(1i64)]).unwrap();

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert!(events[0].token.is_none());
    assert!(events[1].token.is_some());
    assert_eq!(events[1].token, events[2].token);
    assert!(events.iter().all(|e| e.name == "negate" && e.stateful));
    assert_eq!(events[2].output_dtypes, vec![DType::I64]);
    assert_eq!(events[2].returned, 1);
    assert_eq!(events[1].arg_shapes, vec![Vec::<usize>::new()]);
}

#[test]
fn executions_with_rejected_results_are_still_reported() {
    let recorder = Recorder::install();
    let executions = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&executions);
    let too_wide = HostCall::host(
        move |_: &[HostValue]| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(HostValue::from(1i64 << 40).into())
        },
        DType::I32,
    )
    .named("too_wide");
    let err = too_wide.call(&[]).unwrap_err();
    assert!(matches!(err, BridgeError::TypeConversion { .. }));

    let seen = Arc::clone(&executions);
    let short = HostCall::host(
        move |_: &[HostValue]| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(HostReturn::Unit)
        },
        vec![DType::F32, DType::F32],
    )
    .named("short");
    let f = Function::new("short_graph", 0, move |g: &mut GraphBuilder, _: &[Symbol]| {
        g.host_call(&short, &[])
    })
    .with_config(HostCallConfig::default());
    let err = f.call(&[]).unwrap_err();
    assert!(matches!(err, BridgeError::ArityMismatch { expected: 2, got: 0 }));

    let events = recorder.events();
    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, "too_wide");
    assert_eq!(events[0].returned, 1);
    assert_eq!(events[1].name, "short");
    assert_eq!(events[1].returned, 0);
    assert_eq!(events[1].output_dtypes, vec![DType::F32, DType::F32]);
}
