//! Engine connection facade.
//!
//! This module turns a resolved address into a connected engine client:
//!
//! 1. Resolve a unix socket address; when one is found, connect to it.
//! 2. Only when no unix candidate exists, resolve an SSH destination, build
//!    the tunnel and expose it through a local relay socket.
//! 3. Probe the engine for liveness. A client that was built but failed the
//!    probe is handed back alongside the error.
//!
//! Resolution errors other than "no candidate" never fall back to SSH.

mod error_classification;
mod health_check;

use std::sync::Arc;
use std::time::Duration;

use bollard::Docker;
use thiserror::Error;
use tracing::info;

pub use health_check::{EnginePinger, PingFuture};

use super::resolver::{AddressResolver, UnixResolution};
use super::ssh::{
    AuthMethods, HostKeyPolicy, SshConnectionParams, SshOptions, SshRelay, SshTransport,
};
use crate::error::{ContainerError, PodlinkError};

/// Connection timeout in seconds for engine API requests.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Timeout in seconds for the liveness probe.
pub const LIVENESS_TIMEOUT_SECS: u64 = 3;

const UNIX_SCHEME_PREFIX: &str = "unix://";

/// How an [`EngineClient`] reaches the engine.
#[derive(Debug)]
pub enum EngineTransport {
    /// A local unix socket.
    Unix {
        /// The scheme-qualified socket address.
        address: String,
    },
    /// A remote socket tunnelled through an SSH bastion.
    Ssh {
        /// The `ssh://` destination the tunnel was built from.
        destination: String,
        /// The local relay forwarding into the tunnel.
        relay: SshRelay,
    },
}

/// A connected engine API client together with the transport it depends on.
///
/// The transport lives exactly as long as the client. Clients returned by
/// the synchronous constructors also own the runtime driving the tunnel.
#[derive(Debug)]
pub struct EngineClient {
    docker: Docker,
    transport: EngineTransport,
    address: String,
    runtime: Option<tokio::runtime::Runtime>,
}

impl EngineClient {
    fn new(docker: Docker, transport: EngineTransport) -> Self {
        let address = match &transport {
            EngineTransport::Unix { address } => address.clone(),
            EngineTransport::Ssh { relay, .. } => relay.address(),
        };
        Self {
            docker,
            transport,
            address,
            runtime: None,
        }
    }

    fn with_runtime(mut self, runtime: tokio::runtime::Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Returns the engine API client.
    #[must_use]
    pub const fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Returns how the engine is reached.
    #[must_use]
    pub const fn transport(&self) -> &EngineTransport {
        &self.transport
    }

    /// Returns the local socket address the API client talks to.
    ///
    /// For tunnelled clients this is the relay socket.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns true if the engine is reached through an SSH tunnel.
    #[must_use]
    pub const fn is_tunnelled(&self) -> bool {
        matches!(self.transport, EngineTransport::Ssh { .. })
    }

    /// Re-run the liveness probe (async version).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EngineConnector::verify_liveness_async`].
    pub async fn verify_liveness_async(&self) -> Result<(), PodlinkError> {
        EngineConnector::verify_liveness_async(&self.docker, &self.address).await
    }

    /// Re-run the liveness probe.
    ///
    /// Uses the client's own runtime when it has one. Must not be called from
    /// within an async context; use [`Self::verify_liveness_async`] there.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` when called from
    /// inside a tokio runtime, otherwise the errors of
    /// [`EngineConnector::verify_liveness`].
    pub fn verify_liveness(&self) -> Result<(), PodlinkError> {
        match &self.runtime {
            Some(runtime) => {
                EngineConnector::ensure_blocking_allowed()?;
                runtime.block_on(self.verify_liveness_async())
            }
            None => EngineConnector::verify_liveness(&self.docker, &self.address),
        }
    }
}

/// Why [`EngineConnector::connect_resolved`] did not produce a usable client.
#[derive(Debug, Error)]
pub enum ConnectFailure {
    /// No client could be built.
    #[error(transparent)]
    Build(#[from] PodlinkError),

    /// A client was built but the engine did not answer the liveness probe.
    #[error("engine at {} is unreachable: {error}", .client.address())]
    Unreachable {
        /// The built client, returned so the caller may retry or inspect it.
        client: Box<EngineClient>,
        /// The liveness failure.
        error: PodlinkError,
    },
}

impl ConnectFailure {
    /// Returns the underlying error.
    #[must_use]
    pub const fn error(&self) -> &PodlinkError {
        match self {
            Self::Build(error) | Self::Unreachable { error, .. } => error,
        }
    }

    /// Discards any built client and returns the underlying error.
    #[must_use]
    pub fn into_error(self) -> PodlinkError {
        match self {
            Self::Build(error) | Self::Unreachable { error, .. } => error,
        }
    }

    /// Returns the built client, if there is one.
    #[must_use]
    pub fn into_client(self) -> Option<EngineClient> {
        match self {
            Self::Build(_) => None,
            Self::Unreachable { client, .. } => Some(*client),
        }
    }
}

/// Provides methods to connect to a container engine.
pub struct EngineConnector;

impl EngineConnector {
    /// Create an API client for a local unix socket.
    ///
    /// Accepts `unix://` addresses and bare absolute paths. No request is
    /// sent; use the liveness probe to confirm the engine answers.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::UnsupportedScheme` for any other scheme, and
    /// `ContainerError::SocketNotFound`, `ContainerError::PermissionDenied`
    /// or `ContainerError::ConnectionFailed` when the client cannot be built.
    pub fn connect(address: &str) -> Result<Docker, PodlinkError> {
        let socket = Self::normalize_address(address)?;
        Docker::connect_with_socket(
            &socket,
            CONNECTION_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            PodlinkError::from(error_classification::classify_connection_error(&e, &socket))
        })
    }

    /// Normalize an address to a `unix://` URI, rejecting other schemes.
    fn normalize_address(address: &str) -> Result<String, ContainerError> {
        if address.starts_with(UNIX_SCHEME_PREFIX) {
            return Ok(address.to_owned());
        }
        if let Some((scheme, _)) = address.split_once("://") {
            return Err(ContainerError::UnsupportedScheme {
                address: address.to_owned(),
                reason: format!("'{scheme}' addresses cannot be dialled directly"),
            });
        }
        if address.starts_with('/') {
            return Ok(format!("{UNIX_SCHEME_PREFIX}{address}"));
        }
        Err(ContainerError::UnsupportedScheme {
            address: address.to_owned(),
            reason: String::from("expected a unix:// address or an absolute socket path"),
        })
    }

    /// Resolve an address, connect and verify liveness (async version).
    ///
    /// A unix socket is preferred. SSH is attempted only when unix
    /// resolution reports that no candidate exists.
    ///
    /// # Errors
    ///
    /// Returns `ConnectFailure::Build` when resolution, tunnel construction
    /// or client construction fails, and `ConnectFailure::Unreachable` with
    /// the built client when the liveness probe fails or times out.
    pub async fn connect_resolved_async<E: mockable::Env>(
        resolver: &AddressResolver<'_, E>,
        options: &SshOptions,
    ) -> Result<EngineClient, ConnectFailure> {
        Self::connect_resolved_within(
            resolver,
            options,
            Duration::from_secs(LIVENESS_TIMEOUT_SECS),
        )
        .await
    }

    /// Resolve an address, connect and verify liveness.
    ///
    /// This is the synchronous version that creates a dedicated tokio
    /// runtime. The runtime is kept inside the returned client so an SSH
    /// tunnel stays alive for the client's lifetime. Use
    /// [`Self::connect_resolved_async`] when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` (as
    /// `ConnectFailure::Build`) if the runtime cannot be created or the
    /// caller is already inside one, otherwise the errors of
    /// [`Self::connect_resolved_async`].
    pub fn connect_resolved<E: mockable::Env>(
        resolver: &AddressResolver<'_, E>,
        options: &SshOptions,
    ) -> Result<EngineClient, ConnectFailure> {
        let runtime = Self::create_runtime()?;
        match runtime.block_on(Self::connect_resolved_async(resolver, options)) {
            Ok(client) => Ok(client.with_runtime(runtime)),
            Err(ConnectFailure::Unreachable { client, error }) => {
                Err(ConnectFailure::Unreachable {
                    client: Box::new(client.with_runtime(runtime)),
                    error,
                })
            }
            Err(failure) => Err(failure),
        }
    }

    pub(crate) async fn connect_resolved_within<E: mockable::Env>(
        resolver: &AddressResolver<'_, E>,
        options: &SshOptions,
        liveness_timeout: Duration,
    ) -> Result<EngineClient, ConnectFailure> {
        let client = match resolver.resolve_unix() {
            UnixResolution::Resolved { address, source } => {
                info!(%address, %source, "connecting to engine over unix socket");
                let docker = Self::connect(&address)?;
                EngineClient::new(docker, EngineTransport::Unix { address })
            }
            UnixResolution::NoCandidate { .. } => {
                info!("no unix socket candidate; trying ssh destination");
                Self::connect_ssh(resolver, options).await?
            }
        };

        match Self::ping_within(&client.docker, &client.address, liveness_timeout).await {
            Ok(()) => {
                info!(address = %client.address, "engine is live");
                Ok(client)
            }
            Err(error) => Err(ConnectFailure::Unreachable {
                client: Box::new(client),
                error,
            }),
        }
    }

    /// Build the SSH tunnel and an API client speaking through its relay.
    async fn connect_ssh<E: mockable::Env>(
        resolver: &AddressResolver<'_, E>,
        options: &SshOptions,
    ) -> Result<EngineClient, PodlinkError> {
        let destination = resolver.resolve_ssh()?;
        let params = SshConnectionParams::from_uri(
            &destination.uri,
            destination.identity.clone(),
            resolver.identity_passphrase(),
        )?;
        let policy = HostKeyPolicy::for_connection(
            &params,
            options.known_hosts.as_deref(),
            options.strict_host_keys,
        )?;
        let auth = AuthMethods::resolve(
            std::slice::from_ref(&params.key_path),
            params.key_passphrase.as_deref(),
            Some(params.password.as_str()),
        )?;

        let transport = SshTransport::connect(&params, policy, &auth).await?;
        let relay = SshRelay::spawn(Arc::new(transport))?;
        info!(
            destination = %destination.uri,
            relay = %relay.socket_path(),
            "engine reachable through ssh tunnel"
        );

        let docker = Self::connect(&relay.address())?;
        Ok(EngineClient::new(
            docker,
            EngineTransport::Ssh {
                destination: destination.uri,
                relay,
            },
        ))
    }
}
