//! `podlink` application entry point.
//!
//! This binary resolves the engine address and optionally connects to it.
//! It uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/podlink/config.toml` or path from `PODLINK_CONFIG_PATH`)
//! 3. Environment variables (`PODLINK_*`)
//! 4. Command-line arguments
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`).

use clap::Parser;
use eyre::{Report, Result as EyreResult, WrapErr};
use mockable::DefaultEnv;
use podlink::config::{AppConfig, Cli, Commands, LogFormat, load_config};
use podlink::engine::{AddressResolver, ConnectFailure, EngineConnector, UnixResolution};
use podlink::error::Result as PodlinkResult;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point.
///
/// Installs logging, loads configuration with layered precedence via
/// `OrthoConfig`, then dispatches to the subcommand handler.
fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format).wrap_err("failed to install log subscriber")?;

    // The CLI is passed to extract --config, --containers-conf and --known-hosts.
    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config)
}

/// Install the `tracing` subscriber writing to stderr.
fn init_tracing(format: LogFormat) -> EyreResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    match format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(layer.compact())
            .try_init()?,
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(layer.json().with_current_span(false))
            .try_init()?,
    }
    Ok(())
}

/// Execute the CLI command.
///
/// Handlers keep semantic errors; conversion to `eyre::Report` happens here.
fn run(cli: &Cli, config: &AppConfig) -> EyreResult<()> {
    match cli.command {
        Commands::Resolve => resolve(config).map_err(Report::from),
        Commands::Ping => ping(config).map_err(connect_report),
    }
}

/// Print the resolved engine address and the source that supplied it.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn resolve(config: &AppConfig) -> PodlinkResult<()> {
    let env = DefaultEnv::new();
    let resolver = AddressResolver::new(&env, config.engine.resolver_sources());

    match resolver.resolve_unix() {
        UnixResolution::Resolved { address, source } => {
            println!("unix\t{address}\t{source}");
        }
        UnixResolution::NoCandidate { .. } => {
            let destination = resolver.resolve_ssh()?;
            println!(
                "ssh\t{}\t{}\tidentity={}",
                destination.uri, destination.source, destination.identity
            );
        }
    }
    Ok(())
}

/// Connect to the engine and report whether it answered the liveness probe.
#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn ping(config: &AppConfig) -> Result<(), ConnectFailure> {
    let env = DefaultEnv::new();
    let resolver = AddressResolver::new(&env, config.engine.resolver_sources());

    let client = EngineConnector::connect_resolved(&resolver, &config.ssh.ssh_options())?;
    let path = if client.is_tunnelled() { "ssh" } else { "unix" };
    println!("live\t{path}\t{}", client.address());
    Ok(())
}

/// Report a failed connection, keeping "never built" apart from "built but
/// silent".
fn connect_report(failure: ConnectFailure) -> Report {
    match failure {
        ConnectFailure::Build(error) => {
            Report::from(error).wrap_err("could not build an engine client")
        }
        ConnectFailure::Unreachable { client, error } => {
            let transport = if client.is_tunnelled() { "ssh tunnel" } else { "unix socket" };
            Report::from(error).wrap_err(format!(
                "engine client built over {transport} at {} but the engine did not answer",
                client.address()
            ))
        }
    }
}
