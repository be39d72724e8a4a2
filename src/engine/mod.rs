//! Container engine address resolution and connection.
//!
//! An engine address is resolved through a priority-based chain. The first
//! source that yields a candidate wins:
//!
//! 1. `CONTAINER_HOST` environment variable, returned verbatim
//! 2. The best `unix://` destination in the `containers.conf` documents,
//!    where a later document overrides an earlier one
//! 3. `$XDG_RUNTIME_DIR/podman/podman.sock`, if it exists
//! 4. `/run/podman/podman.sock`, if it exists
//!
//! Only when every unix source is exhausted is an `ssh://` destination taken
//! from the same documents, and the remote socket is tunnelled through the
//! bastion.

mod connection;
pub mod containers_conf;
mod files;
pub mod resolver;
pub mod ssh;

pub use connection::{
    ConnectFailure, EngineClient, EngineConnector, EnginePinger, EngineTransport,
    LIVENESS_TIMEOUT_SECS, PingFuture,
};
pub use containers_conf::{EngineConfig, ServiceDestination, TransportKind};
pub use resolver::{
    AddressResolver, CandidateSource, ResolverSources, SshDestination, UnixResolution,
    UnixUriMode,
};
