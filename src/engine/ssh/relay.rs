//! Local unix socket that forwards connections through the SSH tunnel.
//!
//! The engine API client only speaks to local sockets, so the relay binds a
//! private socket in a fresh temporary directory and pipes every accepted
//! connection into a newly dialled remote stream.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::transport::StreamDialer;
use crate::error::SshError;

const RELAY_DIR_PREFIX: &str = "podlink-";
const RELAY_SOCKET_NAME: &str = "engine.sock";

/// A running relay. Dropping it stops the accept loop and removes the socket.
#[derive(Debug)]
pub struct SshRelay {
    socket: Utf8PathBuf,
    accept_loop: JoinHandle<()>,
    _dir: TempDir,
}

impl SshRelay {
    /// Bind the relay socket and start forwarding through `dialer`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SshError::RelayFailed` when the temporary directory or the
    /// socket cannot be created.
    pub fn spawn<D: StreamDialer>(dialer: Arc<D>) -> Result<Self, SshError> {
        let relay_failed = |message: String| SshError::RelayFailed { message };

        let dir = tempfile::Builder::new()
            .prefix(RELAY_DIR_PREFIX)
            .tempdir()
            .map_err(|e| relay_failed(e.to_string()))?;
        let socket = Utf8Path::from_path(dir.path())
            .ok_or_else(|| relay_failed(String::from("temporary directory is not UTF-8")))?
            .join(RELAY_SOCKET_NAME);
        let listener = UnixListener::bind(&socket).map_err(|e| relay_failed(e.to_string()))?;

        debug!(socket = %socket, "relay listening");
        let accept_loop = tokio::spawn(accept_loop(listener, dialer));
        Ok(Self {
            socket,
            accept_loop,
            _dir: dir,
        })
    }

    /// Returns the path of the local relay socket.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket
    }

    /// Returns the relay socket as a `unix://` address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("unix://{}", self.socket)
    }
}

impl Drop for SshRelay {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn accept_loop<D: StreamDialer>(listener: UnixListener, dialer: Arc<D>) {
    loop {
        match listener.accept().await {
            Ok((local, _)) => {
                tokio::spawn(forward(local, Arc::clone(&dialer)));
            }
            Err(e) => {
                warn!(error = %e, "relay stopped accepting connections");
                return;
            }
        }
    }
}

async fn forward<D: StreamDialer>(mut local: UnixStream, dialer: Arc<D>) {
    let mut remote = match dialer.dial().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "could not open remote stream for relayed connection");
            return;
        }
    };
    match tokio::io::copy_bidirectional(&mut local, &mut remote).await {
        Ok((sent, received)) => debug!(sent, received, "relayed connection closed"),
        Err(e) => debug!(error = %e, "relayed connection ended with error"),
    }
}
