//! Integration tests for vpn-config
//!
//! These tests verify config loading with real file system operations.

use std::path::PathBuf;
use tempfile::tempdir;
use vpn_config::testing::TestEnvironment;
use vpn_config::Config;

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let vpn_dir = temp.path().join(".vpn");
    std::fs::create_dir_all(&vpn_dir).unwrap();

    let config_content = r#"
[remote]
host = "vpn1"
networks = ["10.0.0.0/8", "192.168.1.7"]

[transport]
socket_dir = "/run/vpn"

[descriptors]
min_offset = 4096

[log]
level = "debug"
file = "/tmp/vpn.log"
"#;
    let path = vpn_dir.join("config.toml");
    std::fs::write(&path, config_content).unwrap();

    let config = Config::load_file(&path).unwrap();
    assert_eq!(config.remote.host.as_deref(), Some("vpn1"));
    assert_eq!(config.remote.interface, "VPN");
    assert_eq!(config.remote.networks, vec!["10.0.0.0/8", "192.168.1.7"]);
    assert_eq!(config.transport.socket_dir, PathBuf::from("/run/vpn"));
    assert_eq!(config.descriptors.min_offset, 4096);
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.log.file, Some(PathBuf::from("/tmp/vpn.log")));
}

/// Sections left out of a file keep their defaults
#[test]
fn test_partial_config_uses_defaults() {
    let env = TestEnvironment::new().unwrap();
    let path = env
        .write_config(
            r#"
[remote]
host = "gateway"
"#,
        )
        .unwrap();

    let config = Config::load_file(&path).unwrap();
    assert_eq!(config.remote.host.as_deref(), Some("gateway"));
    assert_eq!(config.transport.socket_dir, PathBuf::from("/tmp"));
    assert_eq!(config.descriptors.min_offset, 1024);
    assert_eq!(config.log.level, "warn");
}

/// Project config overrides global config field by field
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();

    let global_path = temp.path().join("global.toml");
    std::fs::write(
        &global_path,
        r#"
[remote]
host = "global-host"
networks = ["10.0.0.0/8"]

[log]
level = "info"
"#,
    )
    .unwrap();

    let project_path = temp.path().join("project.toml");
    std::fs::write(
        &project_path,
        r#"
[remote]
host = "project-host"
"#,
    )
    .unwrap();

    let mut config = Config::load_file(&global_path).unwrap();
    config.merge(Config::load_file(&project_path).unwrap());

    assert_eq!(config.remote.host.as_deref(), Some("project-host"));
    assert_eq!(config.remote.networks, vec!["10.0.0.0/8"]);
    assert_eq!(config.log.level, "info");
}

#[test]
fn test_malformed_config_is_error() {
    let env = TestEnvironment::new().unwrap();
    let path = env.write_config("[remote\nhost = ").unwrap();
    assert!(matches!(
        Config::load_file(&path),
        Err(vpn_config::ConfigError::Toml(_))
    ));
}

#[test]
fn test_missing_config_is_io_error() {
    let temp = tempdir().unwrap();
    assert!(matches!(
        Config::load_file(&temp.path().join("absent.toml")),
        Err(vpn_config::ConfigError::Io(_))
    ));
}
