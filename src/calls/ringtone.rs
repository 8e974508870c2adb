//! Incoming-call alert tone as a managed playback session.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::device::{AudioOutput, AudioSessionMode, Sound};
use crate::playback::{PlaybackRegistry, PlaybackStop};

/// Well-known registry id of the ringtone player.
pub const RINGTONE_PLAYER_ID: &str = "incoming-call-ringtone";

/// Snapshot of the session's stop count, taken when a ring is scheduled.
///
/// A start carrying an outdated ticket is abandoned: some `stop()` ran after
/// the ring was scheduled, so the call it belonged to is already resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingTicket(u64);

type SoundSlot = Arc<Mutex<Option<Arc<dyn Sound>>>>;

fn take_sound(slot: &SoundSlot) -> Option<Arc<dyn Sound>> {
    slot.lock().ok().and_then(|mut s| s.take())
}

/// Stop and release a sound, swallowing errors: stopping an already stopped
/// or disposed resource is not a failure.
async fn halt_sound(player_id: &str, sound: &Arc<dyn Sound>) {
    if let Err(e) = sound.stop().await {
        debug!(target: "Calls/Ringtone", "Stopping {player_id} failed (ignored): {e:?}");
    }
    if let Err(e) = sound.unload().await {
        debug!(target: "Calls/Ringtone", "Unloading {player_id} failed (ignored): {e:?}");
    }
}

/// Stop capability the registry holds for the ringtone.
///
/// Only touches the sound slot, never the session's op lock, so the registry
/// can invoke it while a `start()` is waiting on the registry.
struct RingtoneStop {
    player_id: String,
    slot: SoundSlot,
}

#[async_trait]
impl PlaybackStop for RingtoneStop {
    async fn stop(&self) -> Result<(), anyhow::Error> {
        if let Some(sound) = take_sound(&self.slot) {
            info!(target: "Calls/Ringtone", "Ringtone preempted by another player");
            halt_sound(&self.player_id, &sound).await;
        }
        Ok(())
    }
}

pub struct RingtoneSession {
    player_id: String,
    resource: String,
    audio: Arc<dyn AudioOutput>,
    registry: Arc<PlaybackRegistry>,
    slot: SoundSlot,
    /// Serializes start/stop against each other.
    op: tokio::sync::Mutex<()>,
    /// Bumped by every `stop()`.
    generation: AtomicU64,
}

impl std::fmt::Debug for RingtoneSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingtoneSession")
            .field("player_id", &self.player_id)
            .field("resource", &self.resource)
            .field("playing", &self.is_playing())
            .finish()
    }
}

impl RingtoneSession {
    pub fn new(
        player_id: impl Into<String>,
        resource: impl Into<String>,
        audio: Arc<dyn AudioOutput>,
        registry: Arc<PlaybackRegistry>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            resource: resource.into(),
            audio,
            registry,
            slot: Arc::new(Mutex::new(None)),
            op: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Whether a sound is currently loaded and not yet stopped.
    pub fn is_playing(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Reserve the right to start the tone. Any `stop()` after this call
    /// cancels a [`start_with`](Self::start_with) holding the ticket.
    pub fn ticket(&self) -> RingTicket {
        RingTicket(self.generation.load(Ordering::SeqCst))
    }

    /// Start looping the alert tone.
    ///
    /// Never fails: any device error is logged and the call simply rings
    /// without sound.
    pub async fn start(&self) {
        self.start_with(self.ticket()).await;
    }

    /// Start looping the alert tone unless a `stop()` has run since `ticket`
    /// was taken.
    pub async fn start_with(&self, ticket: RingTicket) {
        let _op = self.op.lock().await;
        if self.is_cancelled(ticket) {
            debug!(target: "Calls/Ringtone", "Ringtone stopped before it started");
            return;
        }

        if let Some(previous) = take_sound(&self.slot) {
            halt_sound(&self.player_id, &previous).await;
        }

        if let Err(e) = self
            .audio
            .configure_session(AudioSessionMode::PlaybackOverSilent)
            .await
        {
            warn!(target: "Calls/Ringtone", "Failed to configure audio session: {e:?}");
        }

        let sound = match self.audio.load(&self.resource).await {
            Ok(sound) => sound,
            Err(e) => {
                warn!(target: "Calls/Ringtone", "Failed to load ringtone {}: {e:?}", self.resource);
                self.registry.unregister(&self.player_id);
                return;
            }
        };

        if self.is_cancelled(ticket) {
            halt_sound(&self.player_id, &sound).await;
            return;
        }

        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(sound.clone());
        }

        self.registry.register(
            self.player_id.clone(),
            Arc::new(RingtoneStop {
                player_id: self.player_id.clone(),
                slot: self.slot.clone(),
            }),
        );
        self.registry.request_playback(&self.player_id).await;

        if !self.holds(&sound) {
            debug!(target: "Calls/Ringtone", "Ringtone released before playback began");
            self.registry.release(&self.player_id);
            return;
        }

        if self.is_cancelled(ticket) {
            // The pending stop() unregisters once it gets the op lock.
            if let Some(sound) = take_sound(&self.slot) {
                halt_sound(&self.player_id, &sound).await;
            }
            self.registry.release(&self.player_id);
            return;
        }

        if let Err(e) = sound.play_looping().await {
            warn!(target: "Calls/Ringtone", "Failed to play ringtone: {e:?}");
            if let Some(sound) = take_sound(&self.slot) {
                halt_sound(&self.player_id, &sound).await;
            }
            self.registry.unregister(&self.player_id);
            return;
        }

        // Preempted while the device was starting playback.
        if !self.holds(&sound) {
            halt_sound(&self.player_id, &sound).await;
            return;
        }

        info!(target: "Calls/Ringtone", "Ringtone playing ({})", self.resource);
    }

    /// Halt and release the tone and leave the registry.
    ///
    /// Safe to call repeatedly or without a prior `start()`.
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _op = self.op.lock().await;

        if let Some(sound) = take_sound(&self.slot) {
            halt_sound(&self.player_id, &sound).await;
            debug!(target: "Calls/Ringtone", "Ringtone stopped");
        }
        self.registry.unregister(&self.player_id);
    }

    fn is_cancelled(&self, ticket: RingTicket) -> bool {
        self.generation.load(Ordering::SeqCst) != ticket.0
    }

    fn holds(&self, sound: &Arc<dyn Sound>) -> bool {
        self.slot
            .lock()
            .map(|s| s.as_ref().is_some_and(|held| Arc::ptr_eq(held, sound)))
            .unwrap_or(false)
    }
}
