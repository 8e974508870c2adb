//! Call manager: owns the lifecycle of an incoming call from offer to
//! resolution.
//!
//! Every transition is decided by the pure table in [`rlcore::state`]; this
//! module sequences the side effects around it. Phase bookkeeping sits behind
//! a synchronous mutex that is never held across an `.await`, and every
//! pipeline re-checks phase and call id after each suspension point, so a
//! remote hang-up racing a local accept can only ever win cleanly.

use async_trait::async_trait;
use log::{debug, info, warn};
use rlcore::handoff::HandoffParams;
use rlcore::protocol::{InboundMessage, IncomingCallOffer, OutboundMessage};
use rlcore::state::{CallPhase, CallTransition, InvalidTransition};
use rlcore::types::call::{CallId, CallSession};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::error::CallError;
use super::permission::check_audio_capture;
use super::ringtone::RingtoneSession;
use crate::config::CallConfig;
use crate::device::{DeviceCapabilities, HapticKind};
use crate::playback::PlaybackRegistry;
use crate::transport::Transport;
use crate::types::events::{
    CallBusy, CallOutcome, CallResolved, EventBus, IncomingCall, publish,
};

/// Transfers an answered call to the call UI (typically a navigation).
#[async_trait]
pub trait CallHandoff: Send + Sync {
    async fn hand_off(&self, params: HandoffParams) -> Result<(), anyhow::Error>;
}

/// Result of a local accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Answer sent and control handed off.
    Answered,
    /// Permission denied (or the check failed); the call was declined.
    PermissionDenied,
    /// The call was ended or replaced while the accept was in flight.
    Superseded,
}

#[derive(Debug, Default)]
struct CallSlot {
    phase: CallPhase,
    session: Option<CallSession>,
    shut_down: bool,
}

impl CallSlot {
    fn is_current(&self, call_id: &CallId, phase: CallPhase) -> bool {
        self.phase == phase
            && self
                .session
                .as_ref()
                .is_some_and(|s| &s.call_id == call_id)
    }

    fn apply(&mut self, transition: CallTransition) -> Result<CallPhase, InvalidTransition> {
        let next = self.phase.apply(transition)?;
        debug!(
            target: "Calls/Manager",
            "Phase {} -> {} ({transition:?})", self.phase, next
        );
        self.phase = next;
        if let Some(session) = self.session.as_mut() {
            session.phase = next;
        }
        Ok(next)
    }
}

pub struct CallManager {
    config: CallConfig,
    transport: Arc<dyn Transport>,
    devices: DeviceCapabilities,
    handoff: Arc<dyn CallHandoff>,
    registry: Arc<PlaybackRegistry>,
    ringtone: RingtoneSession,
    slot: Mutex<CallSlot>,
    ring_timer: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
    shutdown_notifier: Notify,
}

impl std::fmt::Debug for CallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallManager")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("ringtone", &self.ringtone)
            .finish()
    }
}

impl CallManager {
    pub fn new(
        config: CallConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<PlaybackRegistry>,
        devices: DeviceCapabilities,
        handoff: Arc<dyn CallHandoff>,
    ) -> Arc<Self> {
        let ringtone = RingtoneSession::new(
            config.ringtone_player_id.clone(),
            config.ringtone_resource.clone(),
            devices.audio.clone(),
            registry.clone(),
        );
        Arc::new(Self {
            config,
            transport,
            devices,
            handoff,
            registry,
            ringtone,
            slot: Mutex::new(CallSlot::default()),
            ring_timer: Mutex::new(None),
            events: EventBus::new(),
            shutdown_notifier: Notify::new(),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &Arc<PlaybackRegistry> {
        &self.registry
    }

    pub fn ringtone(&self) -> &RingtoneSession {
        &self.ringtone
    }

    pub fn phase(&self) -> CallPhase {
        self.slot().phase
    }

    /// Snapshot of the call in flight, if any.
    pub fn current_call(&self) -> Option<CallSession> {
        self.slot().session.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.slot().shut_down
    }

    pub(crate) fn shutdown_notifier(&self) -> &Notify {
        &self.shutdown_notifier
    }

    /// Dispatch one decoded inbound message. Never fails: anything that does
    /// not apply to the current phase is logged and dropped.
    pub async fn handle_inbound(self: &Arc<Self>, message: InboundMessage) {
        match message {
            InboundMessage::IncomingCall(offer) => self.handle_incoming_call(offer).await,
            InboundMessage::CallEnded { call_id } => {
                self.handle_remote_terminated(call_id, CallOutcome::RemoteEnded)
                    .await
            }
            InboundMessage::CallDeclined { call_id } => {
                self.handle_remote_terminated(call_id, CallOutcome::RemoteDeclined)
                    .await
            }
        }
    }

    async fn handle_incoming_call(self: &Arc<Self>, offer: IncomingCallOffer) {
        let (session, ticket) = {
            let mut slot = self.slot();
            if slot.shut_down {
                debug!(target: "Calls/Manager", "Ignoring offer {} after shutdown", offer.call_id);
                return;
            }

            if let Err(e) = slot.apply(CallTransition::IncomingCall) {
                let active = slot.session.as_ref().map(|s| s.call_id.clone());
                drop(slot);
                match active {
                    Some(active) if active == offer.call_id => {
                        debug!(target: "Calls/Manager", "Duplicate offer for call {}", offer.call_id);
                    }
                    Some(active_call_id) => {
                        info!(
                            target: "Calls/Manager",
                            "Busy with call {active_call_id}, ignoring offer {} from {}",
                            offer.call_id, offer.caller_id
                        );
                        publish(
                            &self.events.call_busy,
                            CallBusy {
                                call_id: offer.call_id,
                                caller_id: offer.caller_id,
                                active_call_id,
                            },
                        );
                    }
                    None => debug!(target: "Calls/Manager", "Dropping offer {}: {e}", offer.call_id),
                }
                return;
            }

            let session = CallSession::new_incoming(offer.call_id, offer.caller_id, offer.caller);
            slot.session = Some(session.clone());
            // Taken under the slot lock: any accept/decline that sees Ringing
            // stops the ringtone after this point and so cancels the start.
            (session, self.ringtone.ticket())
        };

        info!(
            target: "Calls/Manager",
            "Incoming call {} from {} ({})",
            session.call_id,
            session.peer_id,
            session.display_name()
        );

        if self.config.haptics_enabled {
            self.devices.haptics.trigger(HapticKind::IncomingCall);
        }
        let call_id = session.call_id.clone();
        publish(&self.events.incoming_call, IncomingCall { session });

        self.ringtone.start_with(ticket).await;

        let still_ringing = self.slot().is_current(&call_id, CallPhase::Ringing);
        if !still_ringing {
            // Whoever resolved the call owns the ringtone stop.
            debug!(target: "Calls/Manager", "Call {call_id} left ringing during ringtone start");
            return;
        }

        self.arm_ring_timer(call_id);
    }

    async fn handle_remote_terminated(&self, call_id: CallId, outcome: CallOutcome) {
        {
            let mut slot = self.slot();
            let is_current_call = slot
                .session
                .as_ref()
                .is_some_and(|s| s.call_id == call_id);
            if !is_current_call {
                debug!(target: "Calls/Manager", "Ignoring {outcome:?} for unknown call {call_id}");
                return;
            }
            if let Err(e) = slot.apply(CallTransition::RemoteTerminated) {
                debug!(target: "Calls/Manager", "Ignoring {outcome:?} for call {call_id}: {e}");
                return;
            }
        }

        info!(target: "Calls/Manager", "Call {call_id} terminated by peer ({outcome:?})");
        self.cancel_ring_timer();
        self.ringtone.stop().await;
        self.finish(&call_id, outcome);
    }

    /// Accept the ringing call.
    ///
    /// Pipeline: stop ringtone → permission check → `call_answer` → handoff.
    /// The permission check always resolves before the peer is told we
    /// answered and before the call UI is shown.
    pub async fn accept(&self) -> Result<AcceptOutcome, CallError> {
        let call_id = {
            let mut slot = self.slot();
            if slot.shut_down {
                return Err(CallError::ShutDown);
            }
            if !slot.phase.is_ringing() {
                return Err(CallError::NoRingingCall);
            }
            slot.apply(CallTransition::LocalAccept)?;
            match slot.session.as_ref() {
                Some(session) => session.call_id.clone(),
                None => return Err(CallError::NoRingingCall),
            }
        };

        info!(target: "Calls/Manager", "Accepting call {call_id}");
        self.cancel_ring_timer();
        self.ringtone.stop().await;

        if !self
            .slot()
            .is_current(&call_id, CallPhase::AwaitingPermission)
        {
            debug!(target: "Calls/Manager", "Call {call_id} ended while stopping ringtone");
            return Ok(AcceptOutcome::Superseded);
        }

        let granted = check_audio_capture(
            self.devices.permissions.as_ref(),
            self.config.permission_timeout(),
        )
        .await;

        let session = {
            let mut slot = self.slot();
            if !slot.is_current(&call_id, CallPhase::AwaitingPermission) {
                debug!(
                    target: "Calls/Manager",
                    "Call {call_id} ended while awaiting permission, dropping result"
                );
                return Ok(AcceptOutcome::Superseded);
            }
            let transition = if granted {
                CallTransition::PermissionGranted
            } else {
                CallTransition::PermissionDenied
            };
            slot.apply(transition)?;
            slot.session.clone()
        };
        let Some(session) = session else {
            return Ok(AcceptOutcome::Superseded);
        };

        if !granted {
            info!(target: "Calls/Manager", "Microphone permission denied, declining call {call_id}");
            self.send_logged(OutboundMessage::decline(&session.peer_id, call_id.clone()))
                .await;
            self.finish(&call_id, CallOutcome::PermissionDenied);
            return Ok(AcceptOutcome::PermissionDenied);
        }

        if let Err(e) = self
            .send(OutboundMessage::answer(&session.peer_id, call_id.clone()))
            .await
        {
            warn!(target: "Calls/Manager", "Failed to answer call {call_id}: {e}");
            self.finish(&call_id, CallOutcome::SignalingFailed);
            return Err(e);
        }

        let still_accepted = {
            let slot = self.slot();
            !slot.shut_down && slot.is_current(&call_id, CallPhase::Accepted)
        };
        if !still_accepted {
            debug!(target: "Calls/Manager", "Call {call_id} torn down while answering, skipping handoff");
            return Ok(AcceptOutcome::Superseded);
        }

        if let Err(e) = self.handoff.hand_off(HandoffParams::incoming(session)).await {
            warn!(target: "Calls/Manager", "Handoff for call {call_id} failed: {e:?}");
        }
        self.finish(&call_id, CallOutcome::Answered);
        Ok(AcceptOutcome::Answered)
    }

    /// Decline the ringing call.
    pub async fn decline(&self) -> Result<(), CallError> {
        let (call_id, peer_id) = {
            let mut slot = self.slot();
            if slot.shut_down {
                return Err(CallError::ShutDown);
            }
            if !slot.phase.is_ringing() {
                return Err(CallError::NoRingingCall);
            }
            slot.apply(CallTransition::LocalDecline)?;
            match slot.session.as_ref() {
                Some(s) => (s.call_id.clone(), s.peer_id.clone()),
                None => return Err(CallError::NoRingingCall),
            }
        };

        info!(target: "Calls/Manager", "Declining call {call_id}");
        self.cancel_ring_timer();
        self.decline_pipeline(call_id, peer_id, CallOutcome::Declined)
            .await;
        Ok(())
    }

    async fn expire_ringing(&self, call_id: CallId) {
        let peer_id = {
            let mut slot = self.slot();
            if !slot.is_current(&call_id, CallPhase::Ringing) {
                return;
            }
            if slot.apply(CallTransition::LocalDecline).is_err() {
                return;
            }
            slot.session.as_ref().map(|s| s.peer_id.clone())
        };
        let Some(peer_id) = peer_id else { return };

        info!(target: "Calls/Manager", "Call {call_id} rang out, declining");
        self.decline_pipeline(call_id, peer_id, CallOutcome::TimedOut)
            .await;
    }

    async fn decline_pipeline(&self, call_id: CallId, peer_id: String, outcome: CallOutcome) {
        self.ringtone.stop().await;
        self.send_logged(OutboundMessage::decline(peer_id, call_id.clone()))
            .await;
        self.finish(&call_id, outcome);
    }

    /// Unconditional teardown of the owning context.
    ///
    /// Closes the signaling channel, silences the ringtone and discards any
    /// call in flight, whatever its phase. Idempotent.
    pub async fn shutdown(&self) {
        let session = {
            let mut slot = self.slot();
            if slot.shut_down {
                return;
            }
            slot.shut_down = true;
            slot.phase = CallPhase::Idle;
            slot.session.take()
        };

        info!(target: "Calls/Manager", "Shutting down call manager");
        self.shutdown_notifier.notify_waiters();
        self.cancel_ring_timer();
        self.transport.disconnect().await;
        self.ringtone.stop().await;

        if let Some(session) = session {
            publish(
                &self.events.call_resolved,
                CallResolved {
                    call_id: session.call_id,
                    peer_id: session.peer_id,
                    outcome: CallOutcome::Shutdown,
                },
            );
        }
    }

    /// Leave a resolved phase for idle and announce the outcome.
    fn finish(&self, call_id: &CallId, outcome: CallOutcome) {
        let session = {
            let mut slot = self.slot();
            let owns_call = slot
                .session
                .as_ref()
                .is_some_and(|s| &s.call_id == call_id);
            if !owns_call || slot.apply(CallTransition::Reset).is_err() {
                // Shutdown got there first.
                return;
            }
            slot.session.take()
        };

        if let Some(session) = session {
            info!(target: "Calls/Manager", "Call {call_id} resolved: {outcome:?}");
            publish(
                &self.events.call_resolved,
                CallResolved {
                    call_id: session.call_id,
                    peer_id: session.peer_id,
                    outcome,
                },
            );
        }
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), CallError> {
        let frame = message.encode()?;
        debug!(
            target: "Calls/Manager",
            "--> {} for call {}",
            message.kind(),
            message.call_id()
        );
        self.transport
            .send_text(&frame)
            .await
            .map_err(|e| CallError::Transport(e.to_string()))
    }

    async fn send_logged(&self, message: OutboundMessage) {
        let kind = message.kind();
        if let Err(e) = self.send(message).await {
            warn!(target: "Calls/Manager", "Failed to send {kind}: {e}");
        }
    }

    fn arm_ring_timer(self: &Arc<Self>, call_id: CallId) {
        let Some(timeout) = self.config.ring_timeout() else {
            return;
        };
        let manager: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            // Detach ourselves so the decline below cannot abort this task.
            if let Ok(mut timer) = manager.ring_timer.lock() {
                timer.take();
            }
            manager.expire_ringing(call_id).await;
        });

        if let Ok(mut timer) = self.ring_timer.lock()
            && let Some(previous) = timer.replace(handle)
        {
            previous.abort();
        }
    }

    fn cancel_ring_timer(&self) {
        if let Ok(mut timer) = self.ring_timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
        }
    }

    fn slot(&self) -> MutexGuard<'_, CallSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
