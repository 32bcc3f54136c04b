// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Host-call bridge for SpiralTorch.
//!
//! Host functions written against [`HostValue`]s (or raw tensors) are wrapped
//! in a [`HostCall`] and either invoked eagerly or embedded into graphs traced
//! by a compiled [`Function`]. See [`bridge`] for the stateful/stateless
//! contract.

pub mod bridge;
pub mod error;
pub mod graph;
pub mod host;
pub mod registry;
pub mod telemetry;

pub use bridge::{HostCall, HostFn, HostFunction, HostReturn, OutputTypes, TensorFn};
pub use error::{BridgeError, BridgeResult, HostError};
pub use graph::{Executor, Function, Graph, GraphBuilder, GraphStats, Signature, Symbol};
pub use host::{cast_checked, host_to_tensor, tensor_to_host, HostValue};
pub use registry::{global_function_registry, FunctionRegistry, FunctionToken, Registration};
pub use spiral_config::HostCallConfig;
pub use st_tensor::{DType, Tensor};
