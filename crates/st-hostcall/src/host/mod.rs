// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Host-native values and the conversion boundary between them and tensors.

mod convert;
mod value;

pub use convert::{cast_checked, host_to_tensor, tensor_to_host};
pub use value::HostValue;
