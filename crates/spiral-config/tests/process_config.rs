// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

// The process configuration is a single global, so this binary holds one
// test that walks through its whole lifecycle.

use std::io::Write;

use spiral_config::{config, configure, try_config, ConfigError, HostCallConfig};

#[test]
fn broken_file_is_reported_then_explicit_config_wins() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[hostcall]\noptimize = \"sometimes\"").unwrap();
    std::env::set_var("SPIRAL_HOSTCALL_CONFIG", file.path());

    let err = try_config().unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    // Nothing is cached after a failed load.
    assert!(try_config().is_err());

    let custom = HostCallConfig {
        optimize: false,
        catch_panics: false,
        retrace_warning_threshold: 1,
    };
    configure(custom.clone()).unwrap();
    assert_eq!(config(), &custom);
    assert_eq!(try_config().unwrap(), &custom);

    let rejected = configure(HostCallConfig::default()).unwrap_err();
    assert_eq!(rejected, HostCallConfig::default());
    assert_eq!(config(), &custom);

    std::env::remove_var("SPIRAL_HOSTCALL_CONFIG");
}
