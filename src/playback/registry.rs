//! Process-wide arbiter for the audio output.
//!
//! Every playback-capable component registers a stop capability on mount and
//! calls [`PlaybackRegistry::request_playback`] right before it starts making
//! sound. The registry stops everybody else first, so at most one player is
//! ever active.

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Zero-argument capability that halts playback for one component.
///
/// Implementations must tolerate being called when nothing is playing.
#[async_trait]
pub trait PlaybackStop: Send + Sync {
    async fn stop(&self) -> Result<(), anyhow::Error>;
}

/// Adapter turning an async closure into a [`PlaybackStop`].
pub struct StopFn<F>(F);

/// Wrap a closure as a stop capability.
pub fn stop_fn<F, Fut>(f: F) -> Arc<dyn PlaybackStop>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
{
    Arc::new(StopFn(f))
}

#[async_trait]
impl<F, Fut> PlaybackStop for StopFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), anyhow::Error>> + Send,
{
    async fn stop(&self) -> Result<(), anyhow::Error> {
        (self.0)().await
    }
}

pub struct PlaybackRegistry {
    entries: DashMap<String, Arc<dyn PlaybackStop>>,
    active: Mutex<Option<String>>,
    /// Serializes the stop-then-activate sequence of concurrent requests.
    arbiter: tokio::sync::Mutex<()>,
    active_tx: watch::Sender<Option<String>>,
}

impl std::fmt::Debug for PlaybackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackRegistry")
            .field("entries", &self.entries.len())
            .field("active", &self.active_player())
            .finish()
    }
}

impl Default for PlaybackRegistry {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            active: Mutex::new(None),
            arbiter: tokio::sync::Mutex::new(()),
            active_tx: watch::channel(None).0,
        }
    }
}

impl PlaybackRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store (or overwrite) the stop capability for `player_id`.
    ///
    /// Overwriting keeps the player's active status.
    pub fn register(&self, player_id: impl Into<String>, stop: Arc<dyn PlaybackStop>) {
        let player_id = player_id.into();
        debug!(target: "Playback/Registry", "Registered player {player_id}");
        self.entries.insert(player_id, stop);
    }

    /// Remove `player_id`. Unregistering the active player leaves silence.
    pub fn unregister(&self, player_id: &str) {
        if self.entries.remove(player_id).is_none() {
            return;
        }
        debug!(target: "Playback/Registry", "Unregistered player {player_id}");
        self.clear_active_if(player_id);
    }

    /// Win exclusive use of the audio output for `player_id`.
    ///
    /// Stops every other registered player, then marks `player_id` as the
    /// sole active entry. A failing stop is logged and skipped; it never
    /// blocks the others or the activation. A requester that is not
    /// registered once the stops finish leaves the output silent.
    pub async fn request_playback(&self, player_id: &str) {
        let _turn = self.arbiter.lock().await;

        // Snapshot first: stop capabilities may re-enter the registry.
        let others: Vec<(String, Arc<dyn PlaybackStop>)> = self
            .entries
            .iter()
            .filter(|entry| entry.key() != player_id)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (other_id, stop) in others {
            if let Err(e) = stop.stop().await {
                warn!(
                    target: "Playback/Registry",
                    "Failed to stop player {other_id} for {player_id}: {e:?}"
                );
            }
        }

        // Stops may suspend; the requester can unmount meanwhile.
        if !self.entries.contains_key(player_id) {
            debug!(
                target: "Playback/Registry",
                "Player {player_id} is not registered, leaving output silent"
            );
            self.set_active(None);
            return;
        }
        self.set_active(Some(player_id.to_string()));
    }

    /// A player finished on its own; drop the active marker if it holds it.
    pub fn release(&self, player_id: &str) {
        self.clear_active_if(player_id);
    }

    /// Stop every registered player and leave the output silent.
    pub async fn stop_all(&self) {
        let _turn = self.arbiter.lock().await;

        let all: Vec<(String, Arc<dyn PlaybackStop>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (player_id, stop) in all {
            if let Err(e) = stop.stop().await {
                warn!(target: "Playback/Registry", "Failed to stop player {player_id}: {e:?}");
            }
        }
        self.set_active(None);
    }

    pub fn active_player(&self) -> Option<String> {
        self.active.lock().ok().and_then(|a| a.clone())
    }

    pub fn is_active(&self, player_id: &str) -> bool {
        self.active
            .lock()
            .map(|a| a.as_deref() == Some(player_id))
            .unwrap_or(false)
    }

    pub fn is_registered(&self, player_id: &str) -> bool {
        self.entries.contains_key(player_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observe which player currently holds the output.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.active_tx.subscribe()
    }

    fn set_active(&self, player_id: Option<String>) {
        if let Ok(mut active) = self.active.lock() {
            if *active == player_id {
                return;
            }
            debug!(target: "Playback/Registry", "Active player: {:?} -> {:?}", *active, player_id);
            active.clone_from(&player_id);
        }
        self.active_tx.send_replace(player_id);
    }

    fn clear_active_if(&self, player_id: &str) {
        if self.is_active(player_id) {
            self.set_active(None);
        }
    }
}
