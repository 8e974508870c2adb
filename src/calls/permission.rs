//! Microphone permission check inserted into the accept path.

use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionStatus {
    pub granted: bool,
}

impl PermissionStatus {
    pub const GRANTED: Self = Self { granted: true };
    pub const DENIED: Self = Self { granted: false };
}

/// Device capability answering whether audio capture is allowed.
///
/// One awaitable check per call attempt. No retries: a denial ends the attempt.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_audio_capture_permission(&self) -> Result<PermissionStatus, anyhow::Error>;
}

/// Gate with a fixed answer, for platforms without a runtime permission model.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissionGate(pub PermissionStatus);

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self(PermissionStatus::GRANTED)
    }

    pub fn denied() -> Self {
        Self(PermissionStatus::DENIED)
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request_audio_capture_permission(&self) -> Result<PermissionStatus, anyhow::Error> {
        Ok(self.0)
    }
}

/// Run the gate, folding errors and timeouts into a denial.
pub(crate) async fn check_audio_capture(
    gate: &dyn PermissionGate,
    timeout: Option<Duration>,
) -> bool {
    let request = gate.request_audio_capture_permission();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "Calls/Permission", "Permission request timed out after {limit:?}");
                return false;
            }
        },
        None => request.await,
    };

    match result {
        Ok(status) => {
            debug!(target: "Calls/Permission", "Audio capture granted={}", status.granted);
            status.granted
        }
        Err(e) => {
            warn!(target: "Calls/Permission", "Permission check failed, treating as denied: {e:?}");
            false
        }
    }
}
