//! SSH session to the bastion and channels to the remote engine socket.
//!
//! One session is established per transport. Every [`SshTransport::open_stream`]
//! opens a fresh `direct-streamlocal@openssh.com` channel to the fixed
//! remote socket path over that session.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{Algorithm, EcdsaCurve, PrivateKeyWithHashAlg, PublicKey};
use russh::{ChannelStream, Preferred, client};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::known_hosts::HostKeyPolicy;
use super::params::SshConnectionParams;
use super::signers::AuthMethods;
use crate::error::SshError;

/// Time allowed for TCP connect, key exchange and authentication.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

/// Host-key algorithms the client negotiates, in preference order.
const HOST_KEY_ALGORITHMS: &[Algorithm] = &[
    Algorithm::Dsa,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Ed25519,
    Algorithm::Rsa { hash: None },
];

/// Boxed future returned by [`StreamDialer`] implementors.
pub type DialFuture<'a, S> = Pin<Box<dyn Future<Output = Result<S, SshError>> + Send + 'a>>;

/// Something that can open byte streams to the remote engine socket.
///
/// This abstraction keeps the local relay testable without a bastion.
pub trait StreamDialer: Send + Sync + 'static {
    /// The stream type produced by each dial.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream to the remote socket.
    fn dial(&self) -> DialFuture<'_, Self::Stream>;
}

/// russh client configuration restricted to the supported host-key algorithms.
#[must_use]
pub fn client_config() -> client::Config {
    client::Config {
        preferred: Preferred {
            key: Cow::Borrowed(HOST_KEY_ALGORITHMS),
            ..Preferred::default()
        },
        ..client::Config::default()
    }
}

/// Session callbacks; only host-key verification is customised.
struct HostKeyCheck {
    host: String,
    policy: HostKeyPolicy,
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = self.policy.accepts(server_public_key);
        if !accepted {
            warn!(
                host = %self.host,
                algorithm = %server_public_key.algorithm().as_str(),
                "host key does not match any trusted key"
            );
        }
        Ok(accepted)
    }
}

/// An authenticated SSH session able to open channels to the engine socket.
///
/// Cloning shares the underlying session.
#[derive(Clone)]
pub struct SshTransport {
    handle: Arc<client::Handle<HostKeyCheck>>,
    host: String,
    remote_path: String,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("host", &self.host)
            .field("remote_path", &self.remote_path)
            .finish_non_exhaustive()
    }
}

impl SshTransport {
    /// Dial the bastion, verify its host key and authenticate.
    ///
    /// The whole handshake is bounded by [`HANDSHAKE_TIMEOUT_SECS`].
    ///
    /// # Errors
    ///
    /// Returns `SshError::HandshakeTimeout` when the bastion does not finish
    /// in time, `SshError::HandshakeFailed` for connection, key exchange or
    /// host-key failures, and `SshError::AuthenticationRejected` when every
    /// offered method is refused.
    pub async fn connect(
        params: &SshConnectionParams,
        policy: HostKeyPolicy,
        auth: &AuthMethods,
    ) -> Result<Self, SshError> {
        Self::connect_within(
            params,
            policy,
            auth,
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        )
        .await
    }

    pub(crate) async fn connect_within(
        params: &SshConnectionParams,
        policy: HostKeyPolicy,
        auth: &AuthMethods,
        timeout: Duration,
    ) -> Result<Self, SshError> {
        let handle = tokio::time::timeout(timeout, Self::handshake(params, policy, auth))
            .await
            .map_err(|_| SshError::HandshakeTimeout {
                host: params.host.clone(),
                seconds: timeout.as_secs(),
            })??;

        info!(host = %params.host, user = %params.user, "ssh session established");
        Ok(Self {
            handle: Arc::new(handle),
            host: params.host.clone(),
            remote_path: params.path.clone(),
        })
    }

    async fn handshake(
        params: &SshConnectionParams,
        policy: HostKeyPolicy,
        auth: &AuthMethods,
    ) -> Result<client::Handle<HostKeyCheck>, SshError> {
        let failed = |e: russh::Error| SshError::HandshakeFailed {
            host: params.host.clone(),
            message: e.to_string(),
        };
        let handler = HostKeyCheck {
            host: params.host.clone(),
            policy,
        };

        debug!(host = %params.host, "dialling bastion");
        let mut handle =
            client::connect(Arc::new(client_config()), params.host.as_str(), handler)
                .await
                .map_err(failed)?;

        if authenticate(&mut handle, &params.user, auth).await.map_err(failed)? {
            Ok(handle)
        } else {
            Err(SshError::AuthenticationRejected {
                host: params.host.clone(),
                user: params.user.clone(),
            })
        }
    }

    /// Returns the bastion as `host:port`.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the engine socket path on the bastion.
    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Open a new channel to the remote engine socket.
    ///
    /// Safe to call concurrently; each call opens its own channel.
    ///
    /// # Errors
    ///
    /// Returns `SshError::ChannelOpenFailed` when the bastion refuses the
    /// channel.
    pub async fn open_stream(&self) -> Result<ChannelStream<client::Msg>, SshError> {
        let channel = self
            .handle
            .channel_open_direct_streamlocal(self.remote_path.as_str())
            .await
            .map_err(|e| SshError::ChannelOpenFailed {
                path: self.remote_path.clone(),
                message: e.to_string(),
            })?;
        debug!(host = %self.host, path = %self.remote_path, "opened channel to engine socket");
        Ok(channel.into_stream())
    }
}

impl StreamDialer for SshTransport {
    type Stream = ChannelStream<client::Msg>;

    fn dial(&self) -> DialFuture<'_, Self::Stream> {
        Box::pin(self.open_stream())
    }
}

/// Offer keys, then the password, then `none` if nothing else is available.
///
/// RSA keys sign with the strongest SHA-2 hash the bastion advertises and
/// fall back to SHA-1 only when it advertises nothing.
///
/// Returns whether the bastion accepted one of the methods.
async fn authenticate(
    handle: &mut client::Handle<HostKeyCheck>,
    user: &str,
    auth: &AuthMethods,
) -> Result<bool, russh::Error> {
    let mut rsa_hash = None;
    for key in auth.keys() {
        let hash = if key.algorithm().is_rsa() {
            if rsa_hash.is_none() {
                rsa_hash = Some(handle.best_supported_rsa_hash().await?.flatten());
            }
            rsa_hash.flatten()
        } else {
            None
        };
        let offered = PrivateKeyWithHashAlg::new(Arc::clone(key), hash);
        if handle.authenticate_publickey(user, offered).await?.success() {
            debug!(user, algorithm = %key.algorithm().as_str(), "public key accepted");
            return Ok(true);
        }
    }

    if let Some(password) = auth.password() {
        if handle.authenticate_password(user, password).await?.success() {
            debug!(user, "password accepted");
            return Ok(true);
        }
    }

    if auth.is_empty() {
        return Ok(handle.authenticate_none(user).await?.success());
    }
    Ok(false)
}
