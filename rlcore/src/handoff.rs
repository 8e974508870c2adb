use serde::Serialize;

use crate::types::call::{CallId, CallSession, PeerProfile};

/// Parameters handed to the call UI once an incoming call is answered.
///
/// Serialized as `{ otherUserId, otherUser, isIncoming, callId }`, which is
/// what the navigation layer expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffParams {
    pub other_user_id: String,
    pub other_user: Option<PeerProfile>,
    pub is_incoming: bool,
    pub call_id: CallId,
}

impl HandoffParams {
    /// Consumes the session: after handoff the call UI owns it.
    pub fn incoming(session: CallSession) -> Self {
        Self {
            other_user_id: session.peer_id,
            other_user: session.peer_profile,
            is_incoming: true,
            call_id: session.call_id,
        }
    }
}
