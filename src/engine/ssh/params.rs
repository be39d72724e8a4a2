//! Connection parameters derived from an `ssh://` destination URI.

use camino::Utf8PathBuf;
use url::{Host, Url};

use crate::error::SshError;

/// Port used when the destination URI does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

const SSH_SCHEME: &str = "ssh";
const SECURE_QUERY_KEY: &str = "secure";

/// Everything needed to dial a bastion and reach the remote engine socket.
///
/// Built once from a resolved destination and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct SshConnectionParams {
    /// The bastion as `host:port`, with IPv6 literals bracketed.
    pub host: String,
    /// The bastion host name without port or brackets.
    pub hostname: String,
    /// The bastion port.
    pub port: u16,
    /// Absolute path of the engine socket on the bastion.
    pub path: String,
    /// The user to authenticate as.
    pub user: String,
    /// Private key offered during authentication.
    pub key_path: Utf8PathBuf,
    /// Passphrase for an encrypted private key.
    pub key_passphrase: Option<String>,
    /// Whether the bastion's host key must be checked against the trust store.
    pub secure: bool,
    /// Password offered after key authentication. Empty means none.
    pub password: String,
}

impl std::fmt::Debug for SshConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnectionParams")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("user", &self.user)
            .field("key_path", &self.key_path)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("secure", &self.secure)
            .field("password", &(!self.password.is_empty()).then_some("<redacted>"))
            .finish_non_exhaustive()
    }
}

impl SshConnectionParams {
    /// Build parameters from an `ssh://[user@]host[:port]/path[?secure=bool]` URI.
    ///
    /// The port defaults to 22 and an empty user falls back to the local
    /// account name. The `secure` query parameter defaults to `true`; only a
    /// false spelling (`0`, `f`, `F`, `false`, `False`, `FALSE`) disables
    /// host-key checking.
    ///
    /// # Errors
    ///
    /// Returns `SshError::UriParse` when the URI does not parse, does not use
    /// the `ssh` scheme, or has no host.
    pub fn from_uri(
        uri: &str,
        key_path: Utf8PathBuf,
        key_passphrase: Option<String>,
    ) -> Result<Self, SshError> {
        let invalid = |message: &str| SshError::UriParse {
            uri: uri.to_owned(),
            message: message.to_owned(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != SSH_SCHEME {
            return Err(invalid(&format!(
                "expected scheme '{SSH_SCHEME}', found '{}'",
                url.scheme()
            )));
        }

        let port = url.port().unwrap_or(DEFAULT_SSH_PORT);
        let (hostname, host) = match url.host() {
            Some(Host::Ipv6(addr)) => (addr.to_string(), format!("[{addr}]:{port}")),
            Some(Host::Ipv4(addr)) => (addr.to_string(), format!("{addr}:{port}")),
            Some(Host::Domain(name)) if !name.is_empty() => {
                (name.to_owned(), format!("{name}:{port}"))
            }
            _ => return Err(invalid("missing host")),
        };

        let user = match url.username() {
            "" => whoami::username(),
            name => name.to_owned(),
        };

        let secure = url
            .query_pairs()
            .find(|(key, _)| key == SECURE_QUERY_KEY)
            .and_then(|(_, value)| parse_flag(&value))
            .unwrap_or(true);

        Ok(Self {
            host,
            hostname,
            port,
            path: url.path().to_owned(),
            user,
            key_path,
            key_passphrase,
            secure,
            password: String::new(),
        })
    }
}

/// Parse a boolean flag in the spellings URI query parameters use.
fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
