//! Configuration system for podlink.
//!
//! This module provides the configuration structures and CLI definitions for the
//! podlink binary. Configuration loading and precedence merging is handled by
//! the `ortho_config` crate: CLI flags override environment variables, which
//! override configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/podlink/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! containers_conf = ["/etc/containers/containers.conf"]
//! default_socket = "/run/podman/podman.sock"
//! strip_unix_authority = false
//!
//! [ssh]
//! known_hosts = "/home/core/.ssh/known_hosts"
//! strict_host_keys = true
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, LogFormat};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, EngineSettings, SshSettings};
