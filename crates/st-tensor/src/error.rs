// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use thiserror::Error;

use crate::DType;

/// Errors emitted by tensor constructors and elementwise kernels.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TensorError {
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },
    #[error("data length mismatch: expected {expected}, got {got}")]
    DataLength { expected: usize, got: usize },
    #[error("shapes {left:?} and {right:?} cannot be broadcast together")]
    IncompatibleShapes { left: Vec<usize>, right: Vec<usize> },
    #[error("shape {shape:?} holds more elements than can be addressed")]
    ShapeOverflow { shape: Vec<usize> },
    #[error("expected a scalar tensor, got shape {shape:?}")]
    NotScalar { shape: Vec<usize> },
    #[error("operation `{op}` is not defined for {dtype}")]
    UnsupportedOperation { op: &'static str, dtype: DType },
}

pub type TensorResult<T> = Result<T, TensorError>;
