// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Graph tracing, optimisation and execution.

mod builder;
mod exec;
mod function;
mod ir;
pub mod optimize;

pub use builder::GraphBuilder;
pub use exec::Executor;
pub use function::{Function, Signature, TraceFn};
pub use ir::{Graph, GraphStats, Node, Op, Symbol, ValueInfo};
pub use optimize::OptimizeReport;
