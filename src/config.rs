use serde::Deserialize;
use std::time::Duration;

use crate::calls::RINGTONE_PLAYER_ID;

const DEFAULT_RINGTONE_RESOURCE: &str = "sounds/incoming_call.mp3";
const DEFAULT_RING_TIMEOUT_SECS: u64 = 45;
const DEFAULT_PERMISSION_TIMEOUT_SECS: u64 = 60;

/// Tunables for the call core.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Registry id the ringtone plays under.
    pub ringtone_player_id: String,
    /// Alert tone resource handed to the audio output.
    pub ringtone_resource: String,
    /// Auto-decline a call still ringing after this many seconds. `None` rings forever.
    pub ring_timeout_secs: Option<u64>,
    /// Treat a permission prompt unanswered after this many seconds as denied.
    pub permission_timeout_secs: Option<u64>,
    pub haptics_enabled: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ringtone_player_id: RINGTONE_PLAYER_ID.to_string(),
            ringtone_resource: DEFAULT_RINGTONE_RESOURCE.to_string(),
            ring_timeout_secs: Some(DEFAULT_RING_TIMEOUT_SECS),
            permission_timeout_secs: Some(DEFAULT_PERMISSION_TIMEOUT_SECS),
            haptics_enabled: true,
        }
    }
}

impl CallConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn ring_timeout(&self) -> Option<Duration> {
        self.ring_timeout_secs.map(Duration::from_secs)
    }

    pub fn permission_timeout(&self) -> Option<Duration> {
        self.permission_timeout_secs.map(Duration::from_secs)
    }
}
