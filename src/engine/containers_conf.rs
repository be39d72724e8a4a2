//! Reading engine destinations from `containers.conf` documents.
//!
//! Only the `[engine]` table is interpreted, and within it only
//! `active_service` and `service_destinations`. Everything else in the
//! document is ignored.
//!
//! ```toml
//! [engine]
//! active_service = "remote"
//!
//! [engine.service_destinations.remote]
//! uri = "ssh://core@bastion:22/run/podman/podman.sock"
//! identity = "/home/core/.ssh/id_ed25519"
//! ```

use std::collections::BTreeMap;

use camino::Utf8Path;
use ortho_config::toml;
use serde::Deserialize;
use tracing::{debug, warn};

use super::files;
use crate::error::ContainersConfError;

/// The kind of transport a destination URI describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// A local unix domain socket (`unix://`).
    Unix,
    /// A remote socket reached through an SSH bastion (`ssh://`).
    Ssh,
}

impl TransportKind {
    /// Returns the URI scheme for this transport.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Ssh => "ssh",
        }
    }

    /// Returns true if `uri` carries this transport's scheme.
    #[must_use]
    pub fn matches(self, uri: &str) -> bool {
        uri.split_once("://")
            .is_some_and(|(scheme, _)| scheme == self.scheme())
    }
}

/// A named remote-engine endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceDestination {
    /// Scheme-qualified address of the engine API.
    pub uri: String,

    /// Path to the private key used for SSH destinations. May be empty.
    pub identity: String,
}

/// The `[engine]` table of one `containers.conf` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the destination the user marked as active.
    pub active_service: String,

    /// Configured destinations keyed by name.
    pub service_destinations: BTreeMap<String, ServiceDestination>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainersConf {
    #[serde(default)]
    engine: EngineConfig,
}

impl EngineConfig {
    /// Parse the `[engine]` table out of a `containers.conf` document body.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the body is not valid TOML or the known
    /// keys have the wrong types.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<ContainersConf>(content).map(|conf| conf.engine)
    }

    /// Pick the best destination for the given transport kind.
    ///
    /// The active service wins when it exists and uses the requested scheme.
    /// Otherwise the first destination in name order with a non-empty,
    /// matching URI is returned.
    #[must_use]
    pub fn destination_for(&self, kind: TransportKind) -> Option<&ServiceDestination> {
        let active = self
            .service_destinations
            .get(&self.active_service)
            .filter(|dest| kind.matches(&dest.uri));
        if active.is_some() {
            return active;
        }

        self.service_destinations
            .values()
            .find(|dest| !dest.uri.is_empty() && kind.matches(&dest.uri))
    }
}

/// Read and parse one `containers.conf` document.
///
/// # Errors
///
/// Returns `ContainersConfError::Unreadable` when the file cannot be opened or
/// read and `ContainersConfError::Malformed` when it does not parse.
pub fn read_engine_config(path: &Utf8Path) -> Result<EngineConfig, ContainersConfError> {
    let content =
        files::read_to_string(path).map_err(|e| ContainersConfError::Unreadable {
            path: path.as_std_path().to_path_buf(),
            message: e.to_string(),
        })?;

    EngineConfig::from_toml(&content).map_err(|e| ContainersConfError::Malformed {
        path: path.as_std_path().to_path_buf(),
        message: e.to_string(),
    })
}

/// Load one document, returning `None` instead of failing.
///
/// Missing documents are expected (most of the default search list does not
/// exist on a given host) and are logged at debug level; anything else is
/// logged as a warning.
#[must_use]
pub fn load_engine_config(path: &Utf8Path) -> Option<EngineConfig> {
    match read_engine_config(path) {
        Ok(config) => Some(config),
        Err(ContainersConfError::Unreadable { message, .. })
            if !path.as_std_path().exists() =>
        {
            debug!(path = %path, %message, "containers.conf not present");
            None
        }
        Err(e) => {
            warn!(path = %path, error = %e, "skipping containers.conf");
            None
        }
    }
}
