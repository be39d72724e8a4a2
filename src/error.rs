//! Semantic error types for the podlink library.
//!
//! This module defines the error hierarchy for podlink, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or branch on, while reserving opaque errors (`eyre::Report`) for the
//! application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while loading podlink's own configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while reading a single `containers.conf` document.
///
/// The resolver logs and skips these; they never abort a resolution attempt.
#[derive(Debug, Error)]
pub enum ContainersConfError {
    /// The document could not be opened or read.
    #[error("cannot read containers.conf at '{path}': {message}")]
    Unreadable {
        /// The path of the document.
        path: PathBuf,
        /// A description of the I/O failure.
        message: String,
    },

    /// The document was read but is not valid TOML of the expected shape.
    #[error("malformed containers.conf at '{path}': {message}")]
    Malformed {
        /// The path of the document.
        path: PathBuf,
        /// A description of the parse failure.
        message: String,
    },
}

/// Errors produced while resolving an engine address.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No unix socket address was found in any candidate source.
    ///
    /// The connection facade turns this into an SSH attempt; other callers
    /// should treat it as terminal.
    #[error("no unix socket address found; searched {exhausted}")]
    NoCandidate {
        /// Human-readable list of the sources that were exhausted.
        exhausted: String,
    },

    /// No configuration document supplied a complete SSH destination.
    #[error("no ssh destination with both uri and identity found; searched {searched}")]
    NoSshCandidate {
        /// Human-readable list of the documents that were searched.
        searched: String,
    },
}

/// Errors that can occur while building the SSH transport.
#[derive(Debug, Error)]
pub enum SshError {
    /// The destination URI is not a valid `ssh://` URI.
    #[error("invalid ssh uri '{uri}': {message}")]
    UriParse {
        /// The offending URI.
        uri: String,
        /// A description of the parse failure.
        message: String,
    },

    /// The identity file could not be read.
    #[error("failed to read identity '{path}': {message}")]
    IdentityUnreadable {
        /// The identity path.
        path: PathBuf,
        /// A description of the I/O failure.
        message: String,
    },

    /// The identity is encrypted and no passphrase was supplied.
    #[error("identity '{path}' is encrypted and no passphrase was supplied")]
    IdentityPassphraseRequired {
        /// The identity path.
        path: PathBuf,
    },

    /// The identity could not be decoded.
    #[error("failed to parse identity '{path}': {message}")]
    IdentityParse {
        /// The identity path.
        path: PathBuf,
        /// A description of the decode failure.
        message: String,
    },

    /// The host-key trust store exists but could not be read.
    #[error("failed to read known hosts file '{path}': {message}")]
    TrustStoreUnreadable {
        /// The trust store path.
        path: PathBuf,
        /// A description of the I/O failure.
        message: String,
    },

    /// Strict host-key checking is enabled and the host has no trusted key.
    #[error("no trusted host key for '{host}' and strict host key checking is enabled")]
    HostKeyUnknown {
        /// The host as `host:port`.
        host: String,
    },

    /// The TCP dial, key exchange, or host-key check against the bastion failed.
    #[error("ssh handshake with '{host}' failed: {message}")]
    HandshakeFailed {
        /// The bastion as `host:port`.
        host: String,
        /// A description of the failure.
        message: String,
    },

    /// The bastion did not complete the handshake within the allotted time.
    #[error("ssh handshake with '{host}' timed out after {seconds} seconds")]
    HandshakeTimeout {
        /// The bastion as `host:port`.
        host: String,
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Every offered authentication method was rejected.
    #[error("ssh authentication as '{user}' rejected by '{host}'")]
    AuthenticationRejected {
        /// The bastion as `host:port`.
        host: String,
        /// The user name that was offered.
        user: String,
    },

    /// The bastion refused to open a channel to the remote socket.
    #[error("failed to open ssh channel to remote socket '{path}': {message}")]
    ChannelOpenFailed {
        /// The remote socket path.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The local relay socket for the tunnel could not be set up.
    #[error("failed to set up local tunnel relay: {message}")]
    RelayFailed {
        /// A description of the failure.
        message: String,
    },
}

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// The resolved address uses a scheme the direct connector cannot dial.
    #[error("unsupported engine address '{address}': {reason}")]
    UnsupportedScheme {
        /// The resolved address.
        address: String,
        /// Why the address cannot be used directly.
        reason: String,
    },

    /// Liveness probe failed - engine did not respond correctly.
    #[error("container engine liveness check failed: {message}")]
    LivenessCheckFailed {
        /// A description of the probe failure.
        message: String,
    },

    /// Liveness probe timed out.
    #[error("container engine liveness check timed out after {seconds} seconds")]
    LivenessTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Failed to create the tokio runtime used by synchronous wrappers.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the failure.
        message: String,
    },
}

/// Top-level error type for the podlink library.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the crate. At the application boundary (main.rs), these
/// errors are converted to `eyre::Report` for human-readable error reporting.
#[derive(Debug, Error)]
pub enum PodlinkError {
    /// An error occurred while loading podlink's configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while resolving the engine address.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// An error occurred while establishing the SSH transport.
    #[error(transparent)]
    Ssh(#[from] SshError),

    /// An error occurred while talking to the container engine.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// A specialised `Result` type for podlink operations.
pub type Result<T> = std::result::Result<T, PodlinkError>;
