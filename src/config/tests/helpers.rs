//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use ortho_config::MergeComposer;
use ortho_config::serde_json::json;
use rstest::fixture;

use crate::config::AppConfig;
use crate::engine::resolver::DEFAULT_SOCKET_PATH;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        [engine]
        containers_conf = ["/etc/containers/containers.conf", "/home/core/.config/containers/containers.conf"]
        xdg_runtime_dir = "/run/user/1000"
        default_socket = "/var/run/podman.sock"
        strip_unix_authority = true

        [ssh]
        known_hosts = "/home/core/.ssh/known_hosts"
        strict_host_keys = true
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        [ssh]
        strict_host_keys = true
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(
        config.engine.containers_conf.is_none(),
        "engine.containers_conf should be None"
    );
    assert!(
        config.engine.xdg_runtime_dir.is_none(),
        "engine.xdg_runtime_dir should be None"
    );
    assert_eq!(
        config.engine.default_socket.as_str(),
        DEFAULT_SOCKET_PATH,
        "engine.default_socket should be the system socket"
    );
    assert!(
        !config.engine.strip_unix_authority,
        "engine.strip_unix_authority should be false"
    );
    assert!(config.ssh.known_hosts.is_none(), "ssh.known_hosts should be None");
    assert!(
        !config.ssh.strict_host_keys,
        "ssh.strict_host_keys should be false"
    );
}

/// Helper: Creates a `MergeComposer` with defaults, file, and env layers for testing layer precedence.
pub fn create_composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = create_composer_with_defaults()?;

    composer.push_file(
        json!({
            "engine": { "default_socket": "/from/file.sock" },
            "ssh": { "known_hosts": "/from/file/known_hosts" }
        }),
        None,
    );

    composer.push_environment(json!({
        "engine": { "default_socket": "/from/env.sock" }
    }));

    Ok(composer)
}
