// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Typed n-dimensional tensors used by the SpiralTorch host-call runtime.

pub mod broadcast;
mod dtype;
mod error;
mod tensor;

pub use crate::dtype::{DType, Element};
pub use crate::error::{TensorError, TensorResult};
pub use crate::tensor::{Storage, Tensor};
