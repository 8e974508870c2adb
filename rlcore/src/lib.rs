//! Platform-independent core of the call signaling stack.
//!
//! Nothing in this crate touches an async runtime: it holds the wire protocol,
//! the call data model and the pure phase-transition table. The runtime crate
//! (`ringline`) drives these types from its event loop.

pub mod error;
pub mod handoff;
pub mod protocol;
pub mod state;
pub mod types;

pub use error::ProtocolError;
