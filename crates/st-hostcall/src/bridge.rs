// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Host-call bridge: runs opaque host functions on tensor arguments.
//!
//! A [`HostCall`] bundles a host function with the dtypes its results must
//! take and a `stateful` flag. Eagerly, [`HostCall::call`] runs it right away.
//! Inside a traced graph ([`GraphBuilder::host_call`](crate::GraphBuilder::host_call))
//! the flag decides whether the optimiser may merge or drop the call:
//! stateful calls run exactly once per logical invocation on every execution,
//! stateless calls carry no such promise.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use st_tensor::{DType, Tensor};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult, HostError};
use crate::host::{cast_checked, host_to_tensor, tensor_to_host, HostValue};
use crate::registry::FunctionToken;
use crate::telemetry::{emit_host_call, HostCallEvent};

/// Host function over host-native values.
pub type HostFn = Arc<dyn Fn(&[HostValue]) -> Result<HostReturn, HostError> + Send + Sync>;

/// Host function that receives tensors unconverted.
pub type TensorFn = Arc<dyn Fn(&[Tensor]) -> Result<Vec<Tensor>, HostError> + Send + Sync>;

/// A callable the bridge can invoke. Two handles are the same function only if
/// they share the same closure allocation.
#[derive(Clone)]
pub enum HostFunction {
    Host(HostFn),
    Tensor(TensorFn),
}

impl HostFunction {
    pub fn host<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostReturn, HostError> + Send + Sync + 'static,
    {
        HostFunction::Host(Arc::new(f))
    }

    pub fn tensor<F>(f: F) -> Self
    where
        F: Fn(&[Tensor]) -> Result<Vec<Tensor>, HostError> + Send + Sync + 'static,
    {
        HostFunction::Tensor(Arc::new(f))
    }

    /// Address of the shared closure.
    pub fn key(&self) -> usize {
        match self {
            HostFunction::Host(f) => Arc::as_ptr(f) as *const () as usize,
            HostFunction::Tensor(f) => Arc::as_ptr(f) as *const () as usize,
        }
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flavour = match self {
            HostFunction::Host(_) => "host",
            HostFunction::Tensor(_) => "tensor",
        };
        write!(f, "HostFunction<{flavour}>({:#x})", self.key())
    }
}

/// Values handed back by a host function.
#[derive(Clone, Debug, PartialEq)]
pub enum HostReturn {
    Unit,
    Single(HostValue),
    Tuple(Vec<HostValue>),
}

impl HostReturn {
    pub fn arity(&self) -> usize {
        match self {
            HostReturn::Unit => 0,
            HostReturn::Single(_) => 1,
            HostReturn::Tuple(values) => values.len(),
        }
    }

    pub fn into_values(self) -> Vec<HostValue> {
        match self {
            HostReturn::Unit => Vec::new(),
            HostReturn::Single(value) => vec![value],
            HostReturn::Tuple(values) => values,
        }
    }
}

impl From<HostValue> for HostReturn {
    fn from(value: HostValue) -> Self {
        HostReturn::Single(value)
    }
}

impl From<Vec<HostValue>> for HostReturn {
    fn from(values: Vec<HostValue>) -> Self {
        HostReturn::Tuple(values)
    }
}

impl From<()> for HostReturn {
    fn from(_: ()) -> Self {
        HostReturn::Unit
    }
}

/// Declared result dtypes of a host call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputTypes {
    Single(DType),
    Many(Vec<DType>),
}

impl OutputTypes {
    pub fn dtypes(&self) -> &[DType] {
        match self {
            OutputTypes::Single(dtype) => std::slice::from_ref(dtype),
            OutputTypes::Many(dtypes) => dtypes,
        }
    }

    pub fn len(&self) -> usize {
        self.dtypes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dtypes().is_empty()
    }
}

impl From<DType> for OutputTypes {
    fn from(dtype: DType) -> Self {
        OutputTypes::Single(dtype)
    }
}

impl From<Vec<DType>> for OutputTypes {
    fn from(dtypes: Vec<DType>) -> Self {
        OutputTypes::Many(dtypes)
    }
}

impl From<&[DType]> for OutputTypes {
    fn from(dtypes: &[DType]) -> Self {
        OutputTypes::Many(dtypes.to_vec())
    }
}

/// One bridge invocation: function, declared output dtypes and statefulness.
#[derive(Clone, Debug)]
pub struct HostCall {
    function: HostFunction,
    output_types: OutputTypes,
    stateful: bool,
    name: Option<String>,
}

impl HostCall {
    /// Wraps `function`. Calls are stateful unless [`HostCall::stateful`] says
    /// otherwise.
    pub fn new(function: HostFunction, output_types: impl Into<OutputTypes>) -> Self {
        Self {
            function,
            output_types: output_types.into(),
            stateful: true,
            name: None,
        }
    }

    pub fn host<F>(f: F, output_types: impl Into<OutputTypes>) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostReturn, HostError> + Send + Sync + 'static,
    {
        Self::new(HostFunction::host(f), output_types)
    }

    pub fn tensors<F>(f: F, output_types: impl Into<OutputTypes>) -> Self
    where
        F: Fn(&[Tensor]) -> Result<Vec<Tensor>, HostError> + Send + Sync + 'static,
    {
        Self::new(HostFunction::tensor(f), output_types)
    }

    /// Declares whether the function has side effects that must be preserved.
    pub fn stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn function(&self) -> &HostFunction {
        &self.function
    }

    pub fn output_types(&self) -> &OutputTypes {
        &self.output_types
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("host_call")
    }

    /// Runs the function immediately, outside any graph.
    pub fn call(&self, args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let site = CallSite {
            name: self.name(),
            token: None,
            stateful: self.stateful,
        };
        execute(
            &self.function,
            &self.output_types,
            &site,
            args,
            spiral_config::config().catch_panics,
        )
    }
}

/// Where an invocation comes from, for errors and telemetry.
pub(crate) struct CallSite<'a> {
    pub name: &'a str,
    pub token: Option<FunctionToken>,
    pub stateful: bool,
}

/// Converts `args`, runs `function` once and converts its results.
///
/// The observer hears about every execution that returned, including ones
/// whose results are then rejected by the arity or dtype checks.
pub(crate) fn execute(
    function: &HostFunction,
    output_types: &OutputTypes,
    site: &CallSite<'_>,
    args: &[Tensor],
    catch_panics: bool,
) -> BridgeResult<Vec<Tensor>> {
    let dtypes = output_types.dtypes();
    let returned = match function {
        HostFunction::Host(f) => {
            let host_args: Vec<HostValue> = args.iter().map(tensor_to_host).collect();
            Returned::Host(run_guarded(site.name, catch_panics, || f(host_args.as_slice()))?.into_values())
        }
        HostFunction::Tensor(f) => Returned::Tensor(run_guarded(site.name, catch_panics, || f(args))?),
    };

    debug!(
        name = site.name,
        token = ?site.token,
        stateful = site.stateful,
        args = args.len(),
        returned = returned.len(),
        "host function executed"
    );
    emit_host_call(&HostCallEvent {
        name: site.name.to_string(),
        token: site.token,
        stateful: site.stateful,
        arg_shapes: args.iter().map(|t| t.shape().to_vec()).collect(),
        output_dtypes: dtypes.to_vec(),
        returned: returned.len(),
    });

    check_arity(dtypes.len(), returned.len())?;
    match returned {
        Returned::Host(values) => values
            .iter()
            .zip(dtypes)
            .map(|(value, &dtype)| host_to_tensor(value, dtype))
            .collect(),
        Returned::Tensor(tensors) => tensors
            .iter()
            .zip(dtypes)
            .map(|(tensor, &dtype)| cast_checked(tensor, dtype))
            .collect(),
    }
}

/// Raw results of a host function before conversion.
enum Returned {
    Host(Vec<HostValue>),
    Tensor(Vec<Tensor>),
}

impl Returned {
    fn len(&self) -> usize {
        match self {
            Returned::Host(values) => values.len(),
            Returned::Tensor(tensors) => tensors.len(),
        }
    }
}

fn check_arity(expected: usize, got: usize) -> BridgeResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(BridgeError::ArityMismatch { expected, got })
    }
}

fn run_guarded<R>(
    name: &str,
    catch_panics: bool,
    f: impl FnOnce() -> Result<R, HostError>,
) -> BridgeResult<R> {
    let result = if catch_panics {
        catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BridgeError::HostPanic {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        })?
    } else {
        f()
    };
    result.map_err(|err| BridgeError::HostFunction {
        name: name.to_string(),
        message: err.to_string(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
