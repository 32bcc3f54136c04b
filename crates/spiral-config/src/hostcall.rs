// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ::tracing::warn;

/// Knobs controlling how host-call graphs are traced and executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCallConfig {
    /// Run common-subexpression and dead-node elimination on traced graphs.
    /// Stateful host calls are never merged or dropped either way.
    pub optimize: bool,
    /// Convert panics raised by host functions into errors.
    pub catch_panics: bool,
    /// Number of traces per compiled function after which every retrace
    /// emits a warning.
    pub retrace_warning_threshold: usize,
}

impl Default for HostCallConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            catch_panics: true,
            retrace_warning_threshold: 5,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    hostcall: HostCallConfig,
}

/// Errors raised while loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse host-call config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl HostCallConfig {
    /// Defaults overridden by `SPIRAL_HOSTCALL_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parses the `[hostcall]` table of a TOML document. Missing keys keep
    /// their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(file.hostcall)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the file named by `SPIRAL_HOSTCALL_CONFIG` (if any) and then
    /// applies environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("SPIRAL_HOSTCALL_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(path.trim())?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(flag) = env_flag("SPIRAL_HOSTCALL_OPTIMIZE") {
            self.optimize = flag;
        }
        if let Some(flag) = env_flag("SPIRAL_HOSTCALL_CATCH_PANICS") {
            self.catch_panics = flag;
        }
        if let Some(threshold) = std::env::var("SPIRAL_HOSTCALL_RETRACE_WARN")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.retrace_warning_threshold = threshold;
        }
        self
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim() {
        "1" | "true" | "True" | "on" | "ON" => Some(true),
        "0" | "false" | "False" | "off" | "OFF" => Some(false),
        _ => None,
    }
}

static CONFIG: OnceLock<HostCallConfig> = OnceLock::new();

/// Returns the process configuration, loading it on first use. A config file
/// that cannot be read or parsed is reported and nothing is cached, so a
/// later call may retry.
pub fn try_config() -> Result<&'static HostCallConfig, ConfigError> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let loaded = HostCallConfig::load()?;
    Ok(CONFIG.get_or_init(|| loaded))
}

/// Like [`try_config`], but a broken config file is logged and the
/// environment alone is used from then on.
pub fn config() -> &'static HostCallConfig {
    try_config().unwrap_or_else(|err| {
        warn!("ignoring host-call config file: {err}");
        CONFIG.get_or_init(HostCallConfig::from_env)
    })
}

/// Installs `cfg` as the process configuration. Fails, handing `cfg` back,
/// when a configuration was already initialised.
pub fn configure(cfg: HostCallConfig) -> Result<(), HostCallConfig> {
    CONFIG.set(cfg)
}
