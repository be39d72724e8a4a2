//! SSH-tunnelled access to a remote engine socket.
//!
//! Building a tunnel takes four steps, each in its own module:
//!
//! 1. [`params`]: derive connection parameters from the `ssh://` URI
//! 2. [`known_hosts`]: decide how the bastion's host key is judged
//! 3. [`signers`]: load the authentication methods to offer
//! 4. [`transport`]: dial, verify and authenticate, then open channels
//!
//! [`relay`] exposes the tunnel as a local unix socket for the API client.

pub mod known_hosts;
pub mod params;
pub mod relay;
pub mod signers;
pub mod transport;

use camino::Utf8PathBuf;

pub use known_hosts::{HostKeyEntry, HostKeyPolicy, HostPattern, TrustStore};
pub use params::SshConnectionParams;
pub use relay::SshRelay;
pub use signers::{AuthMethods, load_signer};
pub use transport::{DialFuture, SshTransport, StreamDialer};

/// Caller-controlled settings for the SSH path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    /// Trust store consulted for secure destinations. `None` means no
    /// trusted keys are available.
    pub known_hosts: Option<Utf8PathBuf>,
    /// Refuse hosts without a trusted key instead of accepting any key.
    pub strict_host_keys: bool,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            known_hosts: known_hosts::default_known_hosts_path(),
            strict_host_keys: false,
        }
    }
}
