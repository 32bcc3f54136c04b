// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::sync::OnceLock;

use spiral_config::tracing::{self as config_tracing, InitError};
use tracing::warn;

static INIT_GUARD: OnceLock<Result<(), String>> = OnceLock::new();

/// Installs the SpiralTorch tracing subscriber once per process. Returns
/// whether a subscriber is active; a subscriber installed elsewhere counts.
pub fn init_tracing() -> bool {
    let result = INIT_GUARD.get_or_init(|| match config_tracing::init_tracing() {
        Ok(()) | Err(InitError::AlreadyInitialised) => Ok(()),
        Err(err) => Err(err.to_string()),
    });

    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to initialise tracing subscriber: {err}");
            false
        }
    }
}
