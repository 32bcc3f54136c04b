// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

mod observer;
mod trace_init;

pub use observer::{emit_host_call, set_host_call_observer, HostCallEvent, HostCallObserver};
pub use trace_init::init_tracing;
