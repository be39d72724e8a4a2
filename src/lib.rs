//! Resolve and connect to a Podman engine.
//!
//! `podlink` decides how to reach a container engine's management API and
//! builds the transport to it. A local unix socket is preferred; when none
//! can be found, the engine socket on a remote bastion is reached through an
//! SSH tunnel and exposed locally so the API client can treat it as a socket.
//!
//! # Example
//!
//! ```ignore
//! use mockable::DefaultEnv;
//! use podlink::engine::{AddressResolver, EngineConnector, ResolverSources};
//! use podlink::engine::ssh::SshOptions;
//!
//! let env = DefaultEnv::new();
//! let resolver = AddressResolver::new(&env, ResolverSources::default());
//! let client = EngineConnector::connect_resolved(&resolver, &SshOptions::default())?;
//! println!("connected via {}", client.address());
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Address resolution, SSH tunnelling and the connection facade
//! - [`error`]: Semantic error types for the library

pub mod config;
pub mod engine;
pub mod error;
