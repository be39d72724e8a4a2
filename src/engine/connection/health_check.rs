//! Engine liveness probe.
//!
//! The probe sends a single ping and bounds the wait. Async and sync
//! variants are provided; the sync variant creates a dedicated runtime.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bollard::Docker;

use super::error_classification::classify_liveness_error;
use super::{EngineConnector, LIVENESS_TIMEOUT_SECS};
use crate::error::{ContainerError, PodlinkError};

/// Boxed future returned by [`EnginePinger`] implementors.
pub type PingFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to probe an engine for liveness.
///
/// This abstraction exists to keep the probe testable without a running
/// daemon.
pub trait EnginePinger {
    /// Send a ping to the engine.
    fn ping(&self) -> PingFuture<'_>;
}

impl EnginePinger for Docker {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(async move { Self::ping(self).await })
    }
}

impl EngineConnector {
    // =========================================================================
    // Liveness - internal helpers
    // =========================================================================

    /// Ping with an explicit timeout (internal helper).
    ///
    /// `address` is only used to classify socket-level failures.
    pub(super) async fn ping_within<P: EnginePinger + ?Sized>(
        pinger: &P,
        address: &str,
        timeout: Duration,
    ) -> Result<(), PodlinkError> {
        tokio::time::timeout(timeout, pinger.ping())
            .await
            .map_err(|_| {
                PodlinkError::from(ContainerError::LivenessTimeout {
                    seconds: timeout.as_secs(),
                })
            })?
            .map_err(|e| PodlinkError::from(classify_liveness_error(&e, address)))?;
        Ok(())
    }

    /// Refuse to block when the caller is already inside a tokio runtime.
    pub(super) fn ensure_blocking_allowed() -> Result<(), PodlinkError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(PodlinkError::from(ContainerError::RuntimeCreationFailed {
                message: String::from(
                    "synchronous call made from within an async runtime; use the async variant",
                ),
            }));
        }
        Ok(())
    }

    /// Create a tokio runtime for synchronous operations.
    ///
    /// Fails instead of nesting when the caller already runs inside a
    /// runtime.
    pub(super) fn create_runtime() -> Result<tokio::runtime::Runtime, PodlinkError> {
        Self::ensure_blocking_allowed()?;
        tokio::runtime::Runtime::new().map_err(|e| {
            PodlinkError::from(ContainerError::RuntimeCreationFailed {
                message: e.to_string(),
            })
        })
    }

    // =========================================================================
    // Liveness - public APIs
    // =========================================================================

    /// Verify the engine answers a ping (async version).
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::LivenessTimeout` if no answer arrives within
    /// [`LIVENESS_TIMEOUT_SECS`], `ContainerError::SocketNotFound` or
    /// `ContainerError::PermissionDenied` when the socket cannot be opened,
    /// and `ContainerError::LivenessCheckFailed` for any other failure.
    pub async fn verify_liveness_async<P: EnginePinger + ?Sized>(
        pinger: &P,
        address: &str,
    ) -> Result<(), PodlinkError> {
        Self::ping_within(pinger, address, Duration::from_secs(LIVENESS_TIMEOUT_SECS)).await
    }

    /// Verify the engine answers a ping.
    ///
    /// This is the synchronous version that creates a dedicated tokio runtime.
    /// Use [`Self::verify_liveness_async`] when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the tokio runtime
    /// cannot be created or the caller is already inside one, otherwise the
    /// errors of [`Self::verify_liveness_async`].
    pub fn verify_liveness<P: EnginePinger + ?Sized>(
        pinger: &P,
        address: &str,
    ) -> Result<(), PodlinkError> {
        let rt = Self::create_runtime()?;
        rt.block_on(Self::verify_liveness_async(pinger, address))
    }
}
