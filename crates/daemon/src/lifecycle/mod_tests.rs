// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use yare::parameterized;

#[parameterized(
    local = { "local", Mode::Local },
    remote = { "remote", Mode::Remote },
    upper = { "REMOTE", Mode::Remote },
    padded = { " local\n", Mode::Local },
)]
fn mode_parses(input: &str, expected: Mode) {
    assert_eq!(input.parse::<Mode>().unwrap(), expected);
}

#[test]
fn unknown_mode_is_rejected() {
    let err = "cloud".parse::<Mode>().unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidMode(ref m) if m == "cloud"));
    assert!(err.to_string().contains("cloud"));
}

#[test]
fn mode_display_round_trips() {
    for mode in [Mode::Local, Mode::Remote] {
        assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
    }
}

#[test]
#[serial]
fn config_paths_live_under_state_dir() {
    let config = Config::for_state_dir(PathBuf::from("/srv/warden"));

    assert_eq!(config.mode, Mode::Local);
    assert_eq!(config.lock_path, PathBuf::from("/srv/warden/wardend.pid"));
    assert_eq!(config.log_path, PathBuf::from("/srv/warden/wardend.log"));
    assert_eq!(config.runtime_config_path, PathBuf::from("/srv/warden/runtime-config.json"));
    assert_eq!(config.supervisor.runtime_config, config.runtime_config_path);
    assert_eq!(config.supervisor.cwd, PathBuf::from("/srv/warden"));
    assert_eq!(config.provisioner.call_timeout, config.call_timeout);
    assert_eq!(config.layout().root(), std::path::Path::new("/srv/warden"));

    let registry = config.registry_config();
    assert_eq!(registry.runtime_config, config.runtime_config_path);
    assert_eq!(registry.base_config, config.base_config_path);
}

#[test]
#[serial]
fn load_honours_mode_and_state_dir() {
    std::env::set_var("WARDEN_STATE_DIR", "/tmp/warden-lifecycle");
    std::env::set_var("WARDEN_MODE", "remote");
    let config = Config::load();
    std::env::remove_var("WARDEN_STATE_DIR");
    std::env::remove_var("WARDEN_MODE");

    let config = config.unwrap();
    assert_eq!(config.mode, Mode::Remote);
    assert_eq!(config.state_dir, PathBuf::from("/tmp/warden-lifecycle"));
}

#[test]
#[serial]
fn load_rejects_bad_mode() {
    std::env::set_var("WARDEN_STATE_DIR", "/tmp/warden-lifecycle");
    std::env::set_var("WARDEN_MODE", "sideways");
    let result = Config::load();
    std::env::remove_var("WARDEN_STATE_DIR");
    std::env::remove_var("WARDEN_MODE");

    assert!(matches!(result, Err(LifecycleError::InvalidMode(_))));
}
