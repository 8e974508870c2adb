use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::CallPhase;

const UNKNOWN_CALLER: &str = "Unknown caller";

/// Opaque call identifier assigned by the initiating peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Denormalized display data for the counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerProfile {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One in-flight call negotiation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: CallId,
    pub peer_id: String,
    pub peer_profile: Option<PeerProfile>,
    pub phase: CallPhase,
    pub received_at: DateTime<Utc>,
}

impl CallSession {
    /// A freshly offered incoming call. Sessions only exist while ringing or later.
    pub fn new_incoming(
        call_id: CallId,
        peer_id: impl Into<String>,
        peer_profile: Option<PeerProfile>,
    ) -> Self {
        Self {
            call_id,
            peer_id: peer_id.into(),
            peer_profile,
            phase: CallPhase::Ringing,
            received_at: Utc::now(),
        }
    }

    /// Name to show for the caller, falling back to a placeholder when the
    /// offer carried no profile.
    pub fn display_name(&self) -> &str {
        match &self.peer_profile {
            Some(p) if !p.display_name.is_empty() => &p.display_name,
            Some(p) if !p.username.is_empty() => &p.username,
            _ => UNKNOWN_CALLER,
        }
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.peer_profile
            .as_ref()
            .and_then(|p| p.avatar_url.as_deref())
    }
}
