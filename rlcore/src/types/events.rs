use serde::Serialize;

use crate::types::call::{CallId, CallSession};

/// A new call started ringing.
#[derive(Debug, Clone, Serialize)]
pub struct IncomingCall {
    pub session: CallSession,
}

/// How a call negotiation ended locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Answer sent and control handed to the call UI.
    Answered,
    /// User declined.
    Declined,
    /// Microphone permission denied, errored or timed out.
    PermissionDenied,
    /// Nobody answered before the ring timeout.
    TimedOut,
    /// Peer hung up before we answered.
    RemoteEnded,
    /// Peer withdrew the offer.
    RemoteDeclined,
    /// The answer could not be sent over the signaling channel.
    SignalingFailed,
    /// The owning context was torn down.
    Shutdown,
}

impl CallOutcome {
    /// Whether the outcome was initiated on this device.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::RemoteEnded | Self::RemoteDeclined)
    }
}

/// A call negotiation finished and the manager is idle again.
#[derive(Debug, Clone, Serialize)]
pub struct CallResolved {
    pub call_id: CallId,
    pub peer_id: String,
    pub outcome: CallOutcome,
}

/// An offer arrived while another call was in flight and was ignored.
#[derive(Debug, Clone, Serialize)]
pub struct CallBusy {
    pub call_id: CallId,
    pub caller_id: String,
    pub active_call_id: CallId,
}
