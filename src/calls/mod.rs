//! Incoming call signaling.
//!
//! # Architecture
//!
//! - [`CallSignalHandler`]: decodes channel frames and routes them to the manager
//! - [`CallManager`]: phase bookkeeping and the accept/decline pipelines
//! - [`RingtoneSession`]: the alert tone, a player in the shared
//!   [`PlaybackRegistry`](crate::playback::PlaybackRegistry)
//! - [`PermissionGate`]: microphone check awaited before answering
//!
//! # Ordering
//!
//! The ringtone is always stopped before `call_answer`/`call_decline` goes
//! out, and permission is always resolved before the call UI is handed the
//! call.

mod error;
mod handler;
mod manager;
mod permission;
mod ringtone;

pub use error::CallError;
pub use handler::CallSignalHandler;
pub use manager::{AcceptOutcome, CallHandoff, CallManager};
pub use permission::{PermissionGate, PermissionStatus, StaticPermissionGate};
pub use ringtone::{RINGTONE_PLAYER_ID, RingTicket, RingtoneSession};
