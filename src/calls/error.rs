//! Call-related error types.

use rlcore::ProtocolError;
use rlcore::state::InvalidTransition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("no incoming call is ringing")]
    NoRingingCall,

    #[error("invalid call state transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("call manager has shut down")]
    ShutDown,
}
