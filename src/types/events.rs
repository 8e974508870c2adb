use std::sync::Arc;
use tokio::sync::broadcast;

pub use rlcore::types::events::*;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 32;

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event type.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    (incoming_call, Arc<IncomingCall>),
    (call_resolved, Arc<CallResolved>),
    (call_busy, Arc<CallBusy>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Send on a channel nobody may be listening to.
pub(crate) fn publish<T>(sender: &broadcast::Sender<Arc<T>>, event: T) {
    // No subscribers is the normal headless case.
    let _ = sender.send(Arc::new(event));
}
