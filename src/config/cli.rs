//! Command-line argument definitions for podlink.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

/// Command-line interface for podlink.
#[derive(Debug, Parser)]
#[command(name = "podlink")]
#[command(
    author,
    version,
    about = "Resolve and connect to a Podman engine over a local socket or an SSH bastion"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// `containers.conf` document to consult, least relevant first.
    ///
    /// Repeat to supply several; replaces the standard search list.
    #[arg(long = "containers-conf", global = true)]
    pub containers_conf: Vec<Utf8PathBuf>,

    /// Trust store of known SSH host keys.
    #[arg(long, global = true)]
    pub known_hosts: Option<Utf8PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Available subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Print the resolved engine address and the path that supplied it.
    Resolve,

    /// Connect to the engine and run the liveness probe.
    Ping,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Single-line human-readable records.
    #[default]
    Compact,
    /// Newline-delimited JSON records.
    Json,
}
