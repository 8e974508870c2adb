//! The duplex signaling channel as seen by the call core.
//!
//! Connection setup, authentication and reconnection live outside this crate;
//! a platform shell hands us an already-connected [`Transport`] plus the
//! receiver of its [`TransportEvent`]s.

use async_trait::async_trait;
use log::debug;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Capacity of the inbound event channel created by [`LoopbackTransport`].
const CHANNEL_CAPACITY: usize = 100;

/// An event produced by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// A text frame has been received from the server.
    TextReceived(String),
    /// The connection was lost.
    Disconnected,
}

/// Represents an active signaling connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text frame to the server.
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// In-memory transport that records outbound frames.
///
/// Used by the demo binary and tests; inbound frames are injected through the
/// sender returned by [`LoopbackTransport::new`].
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> (
        Arc<Self>,
        mpsc::Sender<TransportEvent>,
        mpsc::Receiver<TransportEvent>,
    ) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Arc::new(Self::default()), tx, rx)
    }

    /// Frames sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error> {
        if self.is_closed() {
            anyhow::bail!("Socket is closed");
        }
        debug!("--> Sending frame: {} bytes", text.len());
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_string());
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
