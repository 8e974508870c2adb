//! JSON call-control messages carried over the signaling channel.
//!
//! ```json
//! { "type": "incoming_call", "callId": "c1", "callerId": "u2", "caller": { ... } }
//! { "type": "call_ended", "callId": "c1" }
//! { "type": "call_declined", "callId": "c1" }
//! { "type": "call_answer", "targetUserId": "u2", "callId": "c1" }
//! { "type": "call_decline", "targetUserId": "u2", "callId": "c1" }
//! ```
//!
//! The channel is shared with unrelated app traffic, so frames whose `type`
//! is not a call message decode to `Ok(None)` rather than an error.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::call::{CallId, PeerProfile};

/// An `incoming_call` offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallOffer {
    pub call_id: CallId,
    pub caller_id: String,
    pub caller: Option<PeerProfile>,
}

/// Typed inbound call-protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    IncomingCall(IncomingCallOffer),
    CallEnded { call_id: CallId },
    CallDeclined { call_id: CallId },
}

impl InboundMessage {
    pub fn call_id(&self) -> &CallId {
        match self {
            Self::IncomingCall(offer) => &offer.call_id,
            Self::CallEnded { call_id } | Self::CallDeclined { call_id } => call_id,
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IncomingCall(_) => "incoming_call",
            Self::CallEnded { .. } => "call_ended",
            Self::CallDeclined { .. } => "call_declined",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum RawInbound {
    IncomingCall {
        #[serde(default)]
        call_id: String,
        #[serde(default)]
        caller_id: String,
        #[serde(default)]
        caller: Option<RawCaller>,
    },
    CallEnded {
        #[serde(default)]
        call_id: String,
    },
    CallDeclined {
        #[serde(default)]
        call_id: String,
    },
    #[serde(other)]
    Unrelated,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaller {
    #[serde(default)]
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

fn require_call_id(call_id: String) -> Result<CallId, ProtocolError> {
    if call_id.is_empty() {
        return Err(ProtocolError::MissingField("callId"));
    }
    Ok(CallId::new(call_id))
}

/// Decode one inbound frame.
///
/// Returns `Ok(None)` for frames that belong to other parts of the app.
pub fn decode_inbound(text: &str) -> Result<Option<InboundMessage>, ProtocolError> {
    let raw: RawInbound = serde_json::from_str(text)?;

    let message = match raw {
        RawInbound::IncomingCall {
            call_id,
            caller_id,
            caller,
        } => {
            let call_id = require_call_id(call_id)?;
            // Older servers only filled in the nested profile.
            let caller_id = if caller_id.is_empty() {
                caller.as_ref().map(|c| c.id.clone()).unwrap_or_default()
            } else {
                caller_id
            };
            if caller_id.is_empty() {
                return Err(ProtocolError::MissingField("callerId"));
            }
            let caller = caller.map(|c| PeerProfile {
                id: if c.id.is_empty() {
                    caller_id.clone()
                } else {
                    c.id
                },
                username: c.username,
                display_name: c.display_name,
                avatar_url: c.avatar_url,
            });
            InboundMessage::IncomingCall(IncomingCallOffer {
                call_id,
                caller_id,
                caller,
            })
        }
        RawInbound::CallEnded { call_id } => InboundMessage::CallEnded {
            call_id: require_call_id(call_id)?,
        },
        RawInbound::CallDeclined { call_id } => InboundMessage::CallDeclined {
            call_id: require_call_id(call_id)?,
        },
        RawInbound::Unrelated => return Ok(None),
    };
    Ok(Some(message))
}

/// Outbound call-control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    CallAnswer {
        target_user_id: String,
        call_id: CallId,
    },
    CallDecline {
        target_user_id: String,
        call_id: CallId,
    },
}

impl OutboundMessage {
    pub fn answer(target_user_id: impl Into<String>, call_id: CallId) -> Self {
        Self::CallAnswer {
            target_user_id: target_user_id.into(),
            call_id,
        }
    }

    pub fn decline(target_user_id: impl Into<String>, call_id: CallId) -> Self {
        Self::CallDecline {
            target_user_id: target_user_id.into(),
            call_id,
        }
    }

    pub fn call_id(&self) -> &CallId {
        match self {
            Self::CallAnswer { call_id, .. } | Self::CallDecline { call_id, .. } => call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallAnswer { .. } => "call_answer",
            Self::CallDecline { .. } => "call_decline",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
