//! Host-key trust store in OpenSSH `known_hosts` format.
//!
//! Each line carries comma-separated host patterns, a key type and a
//! base64 key. Patterns are literal names (optionally with `*` and `?`
//! wildcards and a leading `!` for negation) or hashed names of the form
//! `|1|base64(salt)|base64(hmac_sha1(salt, name))`. Lookups use `host` for
//! port 22 and `[host]:port` otherwise.
//!
//! Marker lines (`@cert-authority`, `@revoked`) are skipped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use hmac::{Hmac, Mac};
use russh::keys::PublicKey;
use sha1::Sha1;
use tracing::{debug, warn};

use super::params::{DEFAULT_SSH_PORT, SshConnectionParams};
use crate::engine::files;
use crate::error::SshError;

const HASHED_PREFIX: &str = "|1|";

/// Returns the name a host is filed under in a trust store.
#[must_use]
pub fn lookup_name(hostname: &str, port: u16) -> String {
    if port == DEFAULT_SSH_PORT {
        hostname.to_ascii_lowercase()
    } else {
        format!("[{}]:{port}", hostname.to_ascii_lowercase())
    }
}

/// The per-user trust store, `~/.ssh/known_hosts`.
#[must_use]
pub fn default_known_hosts_path() -> Option<Utf8PathBuf> {
    dirs::home_dir()
        .and_then(|home| Utf8PathBuf::try_from(home).ok())
        .map(|home| home.join(".ssh").join("known_hosts"))
}

/// One host pattern from the first field of a trust-store line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// A literal or wildcard name.
    Name {
        /// The pattern text, lower-cased.
        pattern: String,
        /// Whether a match excludes the line instead of selecting it.
        negated: bool,
    },
    /// A salted HMAC-SHA1 of the lookup name.
    Hashed {
        /// The HMAC key.
        salt: Vec<u8>,
        /// The expected HMAC output.
        digest: Vec<u8>,
    },
}

impl HostPattern {
    fn parse(raw: &str) -> Result<Self, String> {
        if let Some(hashed) = raw.strip_prefix(HASHED_PREFIX) {
            let (salt, digest) = hashed
                .split_once('|')
                .ok_or_else(|| String::from("hashed host is missing its digest"))?;
            let decode = |part: &str| {
                STANDARD
                    .decode(part)
                    .map_err(|e| format!("hashed host is not base64: {e}"))
            };
            return Ok(Self::Hashed {
                salt: decode(salt)?,
                digest: decode(digest)?,
            });
        }

        let (negated, pattern) = raw
            .strip_prefix('!')
            .map_or((false, raw), |rest| (true, rest));
        if pattern.is_empty() {
            return Err(String::from("empty host pattern"));
        }
        Ok(Self::Name {
            pattern: pattern.to_ascii_lowercase(),
            negated,
        })
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Name { pattern, .. } => glob_matches(pattern.as_bytes(), name.as_bytes()),
            Self::Hashed { salt, digest } => Hmac::<Sha1>::new_from_slice(salt)
                .map(|mut mac| {
                    mac.update(name.as_bytes());
                    mac.verify_slice(digest).is_ok()
                })
                .unwrap_or(false),
        }
    }

    const fn is_negated(&self) -> bool {
        matches!(self, Self::Name { negated: true, .. })
    }
}

/// Match `name` against a pattern where `*` spans any run and `?` one byte.
fn glob_matches(pattern: &[u8], name: &[u8]) -> bool {
    match (pattern.split_first(), name.split_first()) {
        (None, None) => true,
        (Some((b'*', rest)), _) => {
            glob_matches(rest, name)
                || name
                    .split_first()
                    .is_some_and(|(_, tail)| glob_matches(pattern, tail))
        }
        (Some((b'?', rest)), Some((_, tail))) => glob_matches(rest, tail),
        (Some((p, rest)), Some((n, tail))) if p == n => glob_matches(rest, tail),
        _ => false,
    }
}

/// A trusted key together with the hosts it is trusted for.
#[derive(Debug, Clone, PartialEq)]
pub struct HostKeyEntry {
    /// Patterns selecting the hosts this key belongs to.
    pub patterns: Vec<HostPattern>,
    /// The trusted public key.
    pub key: PublicKey,
}

impl HostKeyEntry {
    /// Parse one trust-store line.
    ///
    /// Returns `Ok(None)` for blank lines, comments and marker lines.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the line is malformed.
    pub fn parse_line(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
            return Ok(None);
        }

        let mut fields = line.split_whitespace();
        let (Some(hosts), Some(_key_type), Some(key_data)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(String::from("expected host patterns, key type and key"));
        };

        let patterns = hosts
            .split(',')
            .map(HostPattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        let key = russh::keys::parse_public_key_base64(key_data)
            .map_err(|e| format!("invalid public key: {e}"))?;

        Ok(Some(Self { patterns, key }))
    }

    /// Returns true if this entry applies to the lookup name.
    ///
    /// A matching negated pattern excludes the entry regardless of other
    /// patterns.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let mut selected = false;
        for pattern in &self.patterns {
            if pattern.matches(name) {
                if pattern.is_negated() {
                    return false;
                }
                selected = true;
            }
        }
        selected
    }
}

/// The set of trusted host keys loaded from one trust store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustStore {
    entries: Vec<HostKeyEntry>,
}

impl TrustStore {
    /// Load a trust store from disk. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns `SshError::TrustStoreUnreadable` when the file exists but
    /// cannot be read.
    pub fn load(path: &Utf8Path) -> Result<Self, SshError> {
        match files::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content, path.as_str())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "known hosts file not present");
                Ok(Self::default())
            }
            Err(e) => Err(SshError::TrustStoreUnreadable {
                path: path.as_std_path().to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Parse trust-store content, skipping and logging malformed lines.
    ///
    /// `origin` names the source in log messages.
    #[must_use]
    pub fn parse(content: &str, origin: &str) -> Self {
        let entries = content
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match HostKeyEntry::parse_line(line) {
                Ok(entry) => entry,
                Err(reason) => {
                    warn!(origin, line = index + 1, %reason, "skipping malformed known hosts line");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    /// Returns every key trusted for the host.
    #[must_use]
    pub fn keys_for(&self, hostname: &str, port: u16) -> Vec<PublicKey> {
        let name = lookup_name(hostname, port);
        self.entries
            .iter()
            .filter(|entry| entry.matches(&name))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Returns the number of usable entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store has no usable entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How the bastion's host key is judged during the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyPolicy {
    /// Any presented key is accepted.
    AcceptAny,
    /// Only keys with the same key material as one of these are accepted.
    Pinned(Vec<PublicKey>),
}

impl HostKeyPolicy {
    /// Decide the policy for a connection.
    ///
    /// Insecure destinations accept any key. Secure destinations pin the
    /// keys the trust store holds for the host. When the store holds none,
    /// `strict` decides between refusing the connection and accepting any
    /// key with a warning.
    ///
    /// # Errors
    ///
    /// Returns `SshError::TrustStoreUnreadable` when the store cannot be read
    /// and `SshError::HostKeyUnknown` when `strict` is set and the host has
    /// no trusted key.
    pub fn for_connection(
        params: &SshConnectionParams,
        known_hosts: Option<&Utf8Path>,
        strict: bool,
    ) -> Result<Self, SshError> {
        if !params.secure {
            debug!(host = %params.host, "host key checking disabled for destination");
            return Ok(Self::AcceptAny);
        }

        let store = match known_hosts {
            Some(path) => TrustStore::load(path)?,
            None => TrustStore::default(),
        };
        let keys = store.keys_for(&params.hostname, params.port);
        if !keys.is_empty() {
            debug!(host = %params.host, count = keys.len(), "pinning trusted host keys");
            return Ok(Self::Pinned(keys));
        }

        if strict {
            return Err(SshError::HostKeyUnknown {
                host: params.host.clone(),
            });
        }
        warn!(
            host = %params.host,
            "no trusted host key found; accepting whatever key the host presents"
        );
        Ok(Self::AcceptAny)
    }

    /// Returns true if the presented key is acceptable.
    #[must_use]
    pub fn accepts(&self, presented: &PublicKey) -> bool {
        match self {
            Self::AcceptAny => true,
            Self::Pinned(keys) => keys
                .iter()
                .any(|trusted| trusted.key_data() == presented.key_data()),
        }
    }
}
