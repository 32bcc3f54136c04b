// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use st_tensor::{DType, TensorError};
use thiserror::Error;

use crate::graph::Symbol;
use crate::registry::FunctionToken;

/// Failure reported by a host function body.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<TensorError> for HostError {
    fn from(err: TensorError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors surfaced by the host-call bridge, the tracer and the executor.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cannot convert host value to {dtype}: {reason}")]
    TypeConversion { dtype: DType, reason: String },
    #[error("host function returned {got} value(s) but {expected} output type(s) were declared")]
    ArityMismatch { expected: usize, got: usize },
    #[error("host function `{name}` failed: {message}")]
    HostFunction { name: String, message: String },
    #[error("host function `{name}` panicked: {message}")]
    HostPanic { name: String, message: String },
    #[error("no host function registered under `{token}`")]
    UnknownFunction { token: FunctionToken },
    #[error("`{name}` expects {expected} argument(s), got {got}")]
    Signature {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("argument {index} of `{name}` was traced as {expected}, got {got}")]
    ArgumentMismatch {
        name: String,
        index: usize,
        expected: String,
        got: String,
    },
    #[error("symbol {symbol} is not defined in graph `{graph}`")]
    UnknownSymbol { graph: String, symbol: Symbol },
    #[error("node `{op}` received {got} input(s), expected {expected}")]
    MalformedNode {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
