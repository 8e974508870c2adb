//! Exclusive playback coordination.

mod registry;

pub use registry::{PlaybackRegistry, PlaybackStop, StopFn, stop_fn};
