//! Configuration data types for podlink.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::resolver::{
    DEFAULT_SOCKET_PATH, ResolverSources, UnixUriMode, default_config_paths,
};
use crate::engine::ssh::SshOptions;
use crate::engine::ssh::known_hosts::default_known_hosts_path;

/// Where engine addresses are looked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `containers.conf` documents to consult, least relevant first.
    ///
    /// `None` selects the standard system and per-user documents.
    pub containers_conf: Option<Vec<Utf8PathBuf>>,

    /// Runtime directory probed for `podman/podman.sock`.
    ///
    /// `None` defers to `XDG_RUNTIME_DIR`.
    pub xdg_runtime_dir: Option<Utf8PathBuf>,

    /// Socket probed when every other source is exhausted.
    pub default_socket: Utf8PathBuf,

    /// Drop the authority from `unix://host/path` URIs found in
    /// configuration documents.
    pub strip_unix_authority: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            containers_conf: None,
            xdg_runtime_dir: None,
            default_socket: Utf8PathBuf::from(DEFAULT_SOCKET_PATH),
            strip_unix_authority: false,
        }
    }
}

impl EngineSettings {
    /// Build the resolver's candidate sources from these settings.
    #[must_use]
    pub fn resolver_sources(&self) -> ResolverSources {
        ResolverSources {
            config_paths: self
                .containers_conf
                .clone()
                .unwrap_or_else(default_config_paths),
            xdg_runtime_dir: self.xdg_runtime_dir.clone(),
            default_socket: self.default_socket.clone(),
            unix_uri_mode: if self.strip_unix_authority {
                UnixUriMode::StripAuthority
            } else {
                UnixUriMode::Verbatim
            },
        }
    }
}

/// How SSH bastions are trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SshSettings {
    /// Trust store of known host keys.
    ///
    /// `None` selects `~/.ssh/known_hosts`.
    pub known_hosts: Option<Utf8PathBuf>,

    /// Refuse bastions without a trusted host key.
    pub strict_host_keys: bool,
}

impl SshSettings {
    /// Build the options used when dialling a bastion.
    #[must_use]
    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            known_hosts: self.known_hosts.clone().or_else(default_known_hosts_path),
            strict_host_keys: self.strict_host_keys,
        }
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `PODLINK_CONFIG_PATH` environment variable
/// 2. `.podlink.toml` in the current working directory
/// 3. `.podlink.toml` in the home directory
/// 4. `~/.config/podlink/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "PODLINK",
    post_merge_hook,
    discovery(
        app_name = "podlink",
        env_var = "PODLINK_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".podlink.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Engine address sources.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub engine: EngineSettings,

    /// SSH bastion trust settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub ssh: SshSettings,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        if self.engine.default_socket.as_str().is_empty() {
            self.engine.default_socket = Utf8PathBuf::from(DEFAULT_SOCKET_PATH);
        }
        Ok(())
    }
}
