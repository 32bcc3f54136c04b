// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Process-level configuration shared by SpiralTorch crates.

pub mod hostcall;
pub mod tracing;

pub use hostcall::{config, configure, try_config, ConfigError, HostCallConfig};
