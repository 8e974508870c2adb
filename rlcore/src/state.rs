//! Call phase state machine.
//!
//! The table here is pure: it only decides whether a transition is legal and
//! what phase it lands in. Side effects (ringtone, outbound messages, handoff)
//! belong to the runtime's call manager.

use serde::Serialize;
use std::fmt;

/// Lifecycle phase of the single in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// No call in flight.
    #[default]
    Idle,
    /// Incoming call alerting locally.
    Ringing,
    /// User accepted; waiting on the microphone permission check.
    AwaitingPermission,
    /// Permission granted, answer being sent and handed off.
    Accepted,
    /// Declined locally (explicitly, by timeout or by permission denial).
    Declined,
    /// Terminated by the peer before it was answered.
    Ended,
}

impl CallPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Ringing)
    }

    /// Phases a remote `call_ended`/`call_declined` may interrupt.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Ringing | Self::AwaitingPermission)
    }

    /// Phases that only exist while the manager is unwinding a resolution.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined | Self::Ended)
    }

    /// Apply a transition, returning the new phase.
    pub fn apply(self, transition: CallTransition) -> Result<CallPhase, InvalidTransition> {
        use CallTransition::*;

        let next = match (self, transition) {
            (Self::Idle, IncomingCall) => Self::Ringing,
            (Self::Ringing, LocalAccept) => Self::AwaitingPermission,
            (Self::Ringing, LocalDecline) => Self::Declined,
            (Self::AwaitingPermission, PermissionGranted) => Self::Accepted,
            (Self::AwaitingPermission, PermissionDenied) => Self::Declined,
            (Self::Ringing | Self::AwaitingPermission, RemoteTerminated) => Self::Ended,
            (Self::Accepted | Self::Declined | Self::Ended, Reset) => Self::Idle,
            (current, attempted) => {
                return Err(InvalidTransition { current, attempted });
            }
        };
        Ok(next)
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ringing => "ringing",
            Self::AwaitingPermission => "awaiting_permission",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Inputs to the phase table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTransition {
    IncomingCall,
    LocalAccept,
    LocalDecline,
    PermissionGranted,
    /// Explicit denial, permission-check error or permission timeout.
    PermissionDenied,
    /// Peer sent `call_ended` or `call_declined`.
    RemoteTerminated,
    /// Resolution finished; drop back to idle.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub current: CallPhase,
    pub attempted: CallTransition,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid transition {:?} in phase {}",
            self.attempted, self.current
        )
    }
}

impl std::error::Error for InvalidTransition {}
