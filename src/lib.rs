// Re-export core modules for convenience
pub use rlcore::{handoff, protocol, state};

// Core types are re-exported, but events (with EventBus) remain here for runtime-specific functionality
pub mod types {
    pub use rlcore::types::*;
    pub mod events;
}

pub mod calls;
pub mod config;
pub mod device;
pub mod playback;
pub mod transport;

pub use calls::{AcceptOutcome, CallError, CallHandoff, CallManager, CallSignalHandler};
pub use config::CallConfig;
pub use playback::PlaybackRegistry;
