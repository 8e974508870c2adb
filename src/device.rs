//! Device capabilities the call core drives but does not implement.
//!
//! Platform shells provide these (audio session, sound playback, haptics);
//! the core only decides *when* they are invoked.

use async_trait::async_trait;
use std::sync::Arc;

use crate::calls::PermissionGate;

/// How the audio session should be configured before a sound starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSessionMode {
    /// Audible even when the device is in silent mode (ringtones).
    PlaybackOverSilent,
    /// Regular media playback that respects the silent switch.
    Ambient,
}

/// A loaded sound resource.
#[async_trait]
pub trait Sound: Send + Sync {
    async fn play_looping(&self) -> Result<(), anyhow::Error>;

    async fn stop(&self) -> Result<(), anyhow::Error>;

    /// Release the underlying resource. The handle is unusable afterwards.
    async fn unload(&self) -> Result<(), anyhow::Error>;
}

/// The physical audio output.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn configure_session(&self, mode: AudioSessionMode) -> Result<(), anyhow::Error>;

    async fn load(&self, resource: &str) -> Result<Arc<dyn Sound>, anyhow::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    IncomingCall,
}

pub trait Haptics: Send + Sync {
    fn trigger(&self, kind: HapticKind);
}

/// Haptics for platforms without a vibration motor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn trigger(&self, _kind: HapticKind) {}
}

/// Bundle of device capabilities injected into the call manager.
#[derive(Clone)]
pub struct DeviceCapabilities {
    pub audio: Arc<dyn AudioOutput>,
    pub permissions: Arc<dyn PermissionGate>,
    pub haptics: Arc<dyn Haptics>,
}

impl DeviceCapabilities {
    pub fn new(audio: Arc<dyn AudioOutput>, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            audio,
            permissions,
            haptics: Arc::new(NoHaptics),
        }
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }
}

impl std::fmt::Debug for DeviceCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapabilities").finish_non_exhaustive()
    }
}
