//! Engine address resolution across environment, configuration, and filesystem.
//!
//! Unix socket addresses are resolved through a priority-based fallback chain:
//!
//! 1. `CONTAINER_HOST` environment variable (returned verbatim)
//! 2. `containers.conf` documents, scanned in caller order; the last document
//!    with a unix destination wins
//! 3. `<XDG_RUNTIME_DIR>/podman/podman.sock` if it exists
//! 4. The default socket path if it exists
//!
//! SSH destinations come from the same documents, but the first document
//! supplying both a URI and an identity wins and scanning stops there.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::containers_conf::{TransportKind, load_engine_config};
use crate::error::{PodlinkError, ResolutionError};

/// Environment variable carrying a scheme-qualified override address.
pub const CONTAINER_HOST_ENV: &str = "CONTAINER_HOST";

/// Environment variable carrying the passphrase for an encrypted identity.
pub const CONTAINER_PASSPHRASE_ENV: &str = "CONTAINER_PASSPHRASE";

/// Environment variable naming the per-user runtime directory.
pub const XDG_RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Rootful Podman socket probed when nothing else is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/run/podman/podman.sock";

/// Location of the rootless socket relative to the runtime directory.
const RUNTIME_SOCKET_SUFFIX: &str = "podman/podman.sock";

const UNIX_SCHEME_PREFIX: &str = "unix://";

/// How unix destination URIs from configuration are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnixUriMode {
    /// Return the configured URI unchanged.
    #[default]
    Verbatim,
    /// Drop any `user@host:port` authority, keeping only the socket path.
    StripAuthority,
}

impl UnixUriMode {
    fn apply(self, uri: &str) -> String {
        match self {
            Self::Verbatim => uri.to_owned(),
            Self::StripAuthority => strip_unix_authority(uri),
        }
    }
}

/// Rewrite `unix://user@host:port/path` to `unix:///path`.
///
/// URIs that already have an empty authority, or that carry no path at all,
/// are returned unchanged.
#[must_use]
pub fn strip_unix_authority(uri: &str) -> String {
    let Some(rest) = uri.strip_prefix(UNIX_SCHEME_PREFIX) else {
        return uri.to_owned();
    };
    if rest.starts_with('/') {
        return uri.to_owned();
    }
    rest.split_once('/').map_or_else(
        || uri.to_owned(),
        |(_, path)| format!("{UNIX_SCHEME_PREFIX}/{path}"),
    )
}

/// The places an engine address may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// The `CONTAINER_HOST` environment variable.
    Environment,
    /// A `containers.conf` document.
    ConfigFile(Utf8PathBuf),
    /// The rootless socket under the runtime directory.
    RuntimeDir(Utf8PathBuf),
    /// The fixed default socket path.
    DefaultSocket(Utf8PathBuf),
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "{CONTAINER_HOST_ENV}"),
            Self::ConfigFile(path) => write!(f, "config {path}"),
            Self::RuntimeDir(path) => write!(f, "runtime socket {path}"),
            Self::DefaultSocket(path) => write!(f, "default socket {path}"),
        }
    }
}

fn describe_sources(sources: &[CandidateSource]) -> String {
    sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of unix address resolution.
///
/// "Nothing found" is a variant rather than an error so callers can branch on
/// it explicitly; genuine failures are reported through `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixResolution {
    /// An address was found.
    Resolved {
        /// The resolved, scheme-qualified address.
        address: String,
        /// Where the address came from.
        source: CandidateSource,
    },
    /// Every source was consulted and none produced an address.
    NoCandidate {
        /// The sources that were consulted, in order.
        exhausted: Vec<CandidateSource>,
    },
}

impl UnixResolution {
    /// Convert into the resolved address, turning `NoCandidate` into an error.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NoCandidate` naming the exhausted sources.
    pub fn into_address(self) -> Result<String, ResolutionError> {
        match self {
            Self::Resolved { address, .. } => Ok(address),
            Self::NoCandidate { exhausted } => Err(ResolutionError::NoCandidate {
                exhausted: describe_sources(&exhausted),
            }),
        }
    }
}

/// A complete SSH destination taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshDestination {
    /// The `ssh://` URI of the remote engine socket.
    pub uri: String,
    /// Path to the private key used to authenticate.
    pub identity: Utf8PathBuf,
    /// The document the destination was read from.
    pub source: Utf8PathBuf,
}

/// The candidate sources consulted by an [`AddressResolver`].
///
/// Configuration documents are ordered from least to most relevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSources {
    /// `containers.conf` documents, least relevant first.
    pub config_paths: Vec<Utf8PathBuf>,
    /// Runtime directory to probe; falls back to `XDG_RUNTIME_DIR` when `None`.
    pub xdg_runtime_dir: Option<Utf8PathBuf>,
    /// Socket path probed last.
    pub default_socket: Utf8PathBuf,
    /// How unix URIs from configuration are returned.
    pub unix_uri_mode: UnixUriMode,
}

impl Default for ResolverSources {
    fn default() -> Self {
        Self {
            config_paths: default_config_paths(),
            xdg_runtime_dir: None,
            default_socket: Utf8PathBuf::from(DEFAULT_SOCKET_PATH),
            unix_uri_mode: UnixUriMode::Verbatim,
        }
    }
}

impl ResolverSources {
    /// Sources consulting only the given documents, with default probes.
    #[must_use]
    pub fn with_config_paths(config_paths: Vec<Utf8PathBuf>) -> Self {
        Self {
            config_paths,
            ..Self::default()
        }
    }
}

/// The standard `containers.conf` search list, least relevant first.
///
/// The per-user document is included only when a configuration directory
/// can be determined for the current user.
#[must_use]
pub fn default_config_paths() -> Vec<Utf8PathBuf> {
    let mut paths = vec![
        Utf8PathBuf::from("/usr/share/containers/containers.conf"),
        Utf8PathBuf::from("/etc/containers/containers.conf"),
    ];
    if let Some(user_conf) = dirs::config_dir()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
        .map(|dir| dir.join("containers").join("containers.conf"))
    {
        paths.push(user_conf);
    }
    paths
}

/// Resolves engine addresses from the environment, configuration documents,
/// and well-known socket locations.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait,
///   allowing for testable environment variable access.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use podlink::engine::{AddressResolver, ResolverSources, UnixResolution};
///
/// let env = DefaultEnv::new();
/// let resolver = AddressResolver::new(&env, ResolverSources::default());
///
/// if let UnixResolution::Resolved { address, .. } = resolver.resolve_unix() {
///     println!("Found socket: {address}");
/// }
/// ```
pub struct AddressResolver<'a, E: mockable::Env> {
    env: &'a E,
    sources: ResolverSources,
}

impl<'a, E: mockable::Env> AddressResolver<'a, E> {
    /// Creates a new resolver over the given environment and sources.
    #[must_use]
    pub const fn new(env: &'a E, sources: ResolverSources) -> Self {
        Self { env, sources }
    }

    /// Returns the sources this resolver consults.
    #[must_use]
    pub const fn sources(&self) -> &ResolverSources {
        &self.sources
    }

    /// Returns a non-empty environment value.
    fn env_value(&self, name: &str) -> Option<String> {
        self.env.string(name).filter(|value| !value.is_empty())
    }

    /// Returns the passphrase for encrypted identities, if one is set.
    #[must_use]
    pub fn identity_passphrase(&self) -> Option<String> {
        self.env_value(CONTAINER_PASSPHRASE_ENV)
    }

    /// Resolve a unix socket address.
    ///
    /// A socket candidate that cannot be inspected counts as absent, so the
    /// caller can still fall back to SSH on `UnixResolution::NoCandidate`.
    #[must_use]
    pub fn resolve_unix(&self) -> UnixResolution {
        let mut exhausted = vec![CandidateSource::Environment];

        if let Some(address) = self.env_value(CONTAINER_HOST_ENV) {
            debug!(%address, "engine address taken from {CONTAINER_HOST_ENV}");
            return UnixResolution::Resolved {
                address,
                source: CandidateSource::Environment,
            };
        }

        if let Some((address, path)) = self.scan_unix_destinations() {
            debug!(%address, config = %path, "engine address taken from containers.conf");
            return UnixResolution::Resolved {
                address,
                source: CandidateSource::ConfigFile(path),
            };
        }
        exhausted.extend(
            self.sources
                .config_paths
                .iter()
                .cloned()
                .map(CandidateSource::ConfigFile),
        );

        if let Some(runtime_dir) = self.runtime_dir() {
            let socket = runtime_dir.join(RUNTIME_SOCKET_SUFFIX);
            if socket_exists(&socket) {
                return UnixResolution::Resolved {
                    address: format!("{UNIX_SCHEME_PREFIX}{socket}"),
                    source: CandidateSource::RuntimeDir(socket),
                };
            }
            exhausted.push(CandidateSource::RuntimeDir(socket));
        }

        let default_socket = &self.sources.default_socket;
        if socket_exists(default_socket) {
            return UnixResolution::Resolved {
                address: format!("{UNIX_SCHEME_PREFIX}{default_socket}"),
                source: CandidateSource::DefaultSocket(default_socket.clone()),
            };
        }
        exhausted.push(CandidateSource::DefaultSocket(default_socket.clone()));

        debug!(sources = %describe_sources(&exhausted), "no unix engine address found");
        UnixResolution::NoCandidate { exhausted }
    }

    /// Scan every document; each later hit replaces the earlier one.
    fn scan_unix_destinations(&self) -> Option<(String, Utf8PathBuf)> {
        let mut found = None;
        for path in &self.sources.config_paths {
            let Some(config) = load_engine_config(path) else {
                continue;
            };
            if let Some(dest) = config.destination_for(TransportKind::Unix) {
                found = Some((self.sources.unix_uri_mode.apply(&dest.uri), path.clone()));
            }
        }
        found
    }

    fn runtime_dir(&self) -> Option<Utf8PathBuf> {
        self.sources
            .xdg_runtime_dir
            .clone()
            .or_else(|| self.env_value(XDG_RUNTIME_DIR_ENV).map(Utf8PathBuf::from))
    }

    /// Resolve an SSH destination from configuration.
    ///
    /// Documents are consulted in caller order and the first one supplying a
    /// destination with both a URI and an identity wins.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NoSshCandidate` when no document supplies a
    /// complete SSH destination.
    pub fn resolve_ssh(&self) -> Result<SshDestination, PodlinkError> {
        for path in &self.sources.config_paths {
            let Some(config) = load_engine_config(path) else {
                continue;
            };
            let Some(dest) = config.destination_for(TransportKind::Ssh) else {
                continue;
            };
            if dest.uri.is_empty() || dest.identity.is_empty() {
                debug!(config = %path, uri = %dest.uri, "ssh destination lacks an identity");
                continue;
            }
            debug!(uri = %dest.uri, config = %path, "ssh destination taken from containers.conf");
            return Ok(SshDestination {
                uri: dest.uri.clone(),
                identity: Utf8PathBuf::from(&dest.identity),
                source: path.clone(),
            });
        }

        let searched = if self.sources.config_paths.is_empty() {
            String::from("no configuration documents")
        } else {
            self.sources
                .config_paths
                .iter()
                .map(|path| path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Err(ResolutionError::NoSshCandidate { searched }.into())
    }
}

/// Returns whether a socket candidate exists.
///
/// Paths that cannot be inspected, such as those under a directory the
/// caller may not search, are treated as absent.
fn socket_exists(path: &Utf8Path) -> bool {
    match path.as_std_path().try_exists() {
        Ok(exists) => exists,
        Err(e) => {
            debug!(path = %path, error = %e, "socket candidate cannot be inspected; treating as absent");
            false
        }
    }
}
