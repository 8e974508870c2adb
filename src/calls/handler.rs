//! Signaling channel adapter.
//!
//! Decodes inbound frames into call-protocol messages and routes them to the
//! [`CallManager`]. No call logic lives here.

use log::{debug, info, trace};
use rlcore::protocol::{InboundMessage, decode_inbound};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::manager::CallManager;
use crate::transport::TransportEvent;

/// Routes signaling frames to the call manager.
#[derive(Debug, Clone)]
pub struct CallSignalHandler {
    manager: Arc<CallManager>,
}

impl CallSignalHandler {
    pub fn new(manager: Arc<CallManager>) -> Self {
        Self { manager }
    }

    /// Decode a frame, discarding anything that is not a well-formed call
    /// message. An unparseable frame must never take down the signaling path.
    pub fn decode(frame: &str) -> Option<InboundMessage> {
        match decode_inbound(frame) {
            Ok(Some(message)) => Some(message),
            Ok(None) => {
                trace!(target: "Calls/Signal", "Ignoring non-call frame");
                None
            }
            Err(e) => {
                debug!(target: "Calls/Signal", "Discarding malformed signaling frame: {e}");
                None
            }
        }
    }

    /// Handle one text frame. Returns `true` if it carried a call message.
    pub async fn handle_frame(&self, frame: &str) -> bool {
        let Some(message) = Self::decode(frame) else {
            return false;
        };
        debug!(
            target: "Calls/Signal",
            "<-- {} for call {}",
            message.kind(),
            message.call_id()
        );
        self.manager.handle_inbound(message).await;
        true
    }

    /// Pump transport events until the channel closes or the manager shuts down.
    pub async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        loop {
            // Register interest before checking the flag so a shutdown in
            // between cannot be missed.
            let shutdown = self.manager.shutdown_notifier().notified();
            tokio::pin!(shutdown);
            shutdown.as_mut().enable();
            if self.manager.is_shut_down() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    debug!(target: "Calls/Signal", "Shutdown signaled, exiting signaling pump.");
                    break;
                }
                event = events.recv() => match event {
                    Some(TransportEvent::TextReceived(frame)) => {
                        self.handle_frame(&frame).await;
                    }
                    Some(TransportEvent::Connected) => {
                        info!(target: "Calls/Signal", "Signaling channel connected");
                    }
                    Some(TransportEvent::Disconnected) => {
                        // Reconnection belongs to whoever owns the transport.
                        info!(target: "Calls/Signal", "Signaling channel disconnected");
                    }
                    None => {
                        debug!(target: "Calls/Signal", "Event channel closed, exiting signaling pump.");
                        break;
                    }
                },
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(
        manager: Arc<CallManager>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::new(manager).run(events))
    }
}
