#![allow(dead_code)]

use async_trait::async_trait;
use ringline::calls::{CallHandoff, CallManager, CallSignalHandler, PermissionGate, PermissionStatus};
use ringline::device::{AudioOutput, AudioSessionMode, DeviceCapabilities, Haptics, NoHaptics, Sound};
use ringline::handoff::HandoffParams;
use ringline::playback::{PlaybackRegistry, stop_fn};
use ringline::transport::{LoopbackTransport, Transport};
use ringline::CallConfig;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, oneshot};

/// Ordered record of side effects across all doubles of one harness.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// Asserts `first` was recorded and precedes `second` (if present).
    pub fn assert_before(&self, first: &str, second: &str) {
        let entries = self.entries();
        let a = self
            .position(first)
            .unwrap_or_else(|| panic!("{first} missing from {entries:?}"));
        if let Some(b) = self.position(second) {
            assert!(a < b, "expected {first} before {second} in {entries:?}");
        }
    }
}

pub struct FakeSound {
    log: EventLog,
    pub playing: AtomicBool,
    pub fail_play: bool,
}

#[async_trait]
impl Sound for FakeSound {
    async fn play_looping(&self) -> Result<(), anyhow::Error> {
        if self.fail_play {
            anyhow::bail!("audio device busy");
        }
        self.playing.store(true, Ordering::SeqCst);
        self.log.push("ringtone.play");
        Ok(())
    }

    async fn stop(&self) -> Result<(), anyhow::Error> {
        self.playing.store(false, Ordering::SeqCst);
        self.log.push("ringtone.stop");
        Ok(())
    }

    async fn unload(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

pub struct FakeOutput {
    log: EventLog,
    pub fail_load: AtomicBool,
    pub fail_play: AtomicBool,
    pub loads: AtomicUsize,
    pub last_sound: Mutex<Option<Arc<FakeSound>>>,
}

impl FakeOutput {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_load: AtomicBool::new(false),
            fail_play: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            last_sound: Mutex::new(None),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.last_sound
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| s.playing.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn configure_session(&self, _mode: AudioSessionMode) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn load(&self, _resource: &str) -> Result<Arc<dyn Sound>, anyhow::Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            anyhow::bail!("ringtone resource missing");
        }
        let sound = Arc::new(FakeSound {
            log: self.log.clone(),
            playing: AtomicBool::new(false),
            fail_play: self.fail_play.load(Ordering::SeqCst),
        });
        *self.last_sound.lock().unwrap() = Some(sound.clone());
        Ok(sound)
    }
}

pub enum GateAnswer {
    Grant,
    Deny,
    Fail,
    /// Resolved by the test through the returned sender.
    Pending(Mutex<Option<oneshot::Receiver<bool>>>),
}

pub struct RecordingGate {
    log: EventLog,
    answer: GateAnswer,
    pub requests: AtomicUsize,
    /// Permit stored on every request, so tests can wait for one in flight.
    pub requested: Notify,
}

impl RecordingGate {
    fn new(log: EventLog, answer: GateAnswer) -> Self {
        Self {
            log,
            answer,
            requests: AtomicUsize::new(0),
            requested: Notify::new(),
        }
    }
}

#[async_trait]
impl PermissionGate for RecordingGate {
    async fn request_audio_capture_permission(&self) -> Result<PermissionStatus, anyhow::Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.log.push("permission.request");
        self.requested.notify_one();

        let granted = match &self.answer {
            GateAnswer::Grant => true,
            GateAnswer::Deny => false,
            GateAnswer::Fail => {
                self.log.push("permission.resolved");
                anyhow::bail!("permission service unavailable");
            }
            GateAnswer::Pending(rx) => {
                let rx = rx.lock().unwrap().take();
                match rx {
                    Some(rx) => rx.await.unwrap_or(false),
                    None => false,
                }
            }
        };
        self.log.push("permission.resolved");
        Ok(PermissionStatus { granted })
    }
}

pub struct RecordingHandoff {
    log: EventLog,
    pub calls: Mutex<Vec<HandoffParams>>,
}

#[async_trait]
impl CallHandoff for RecordingHandoff {
    async fn hand_off(&self, params: HandoffParams) -> Result<(), anyhow::Error> {
        self.log.push("handoff");
        self.calls.lock().unwrap().push(params);
        Ok(())
    }
}

/// Loopback transport that also records each send into the shared log.
pub struct RecordingTransport {
    log: EventLog,
    pub inner: Arc<LoopbackTransport>,
    /// When set, a send is recorded and then held until notified.
    pub hold_sends: Mutex<Option<Arc<Notify>>>,
    pub send_held: Notify,
}

impl RecordingTransport {
    pub fn hold_next_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_sends.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn sent(&self) -> Vec<Value> {
        self.inner
            .sent()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["type"] == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error> {
        let frame: Value = serde_json::from_str(text)?;
        let kind = frame["type"].as_str().unwrap_or("unknown").to_string();
        self.inner.send_text(text).await?;
        self.log.push(format!("send:{kind}"));

        let hold = self.hold_sends.lock().unwrap().clone();
        if let Some(gate) = hold {
            self.send_held.notify_one();
            gate.notified().await;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.log.push("transport.disconnect");
        self.inner.disconnect().await;
    }
}

pub struct Harness {
    pub log: EventLog,
    pub registry: Arc<PlaybackRegistry>,
    pub output: Arc<FakeOutput>,
    pub gate: Arc<RecordingGate>,
    pub handoff: Arc<RecordingHandoff>,
    pub transport: Arc<RecordingTransport>,
    pub manager: Arc<CallManager>,
    pub handler: CallSignalHandler,
}

impl Harness {
    pub fn new(answer: GateAnswer) -> Self {
        Self::with_config(answer, CallConfig::default())
    }

    /// Harness whose permission prompt stays open until the sender resolves it.
    pub fn pending() -> (Self, oneshot::Sender<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(GateAnswer::Pending(Mutex::new(Some(rx)))), tx)
    }

    pub fn with_config(answer: GateAnswer, config: CallConfig) -> Self {
        Self::build(answer, config, Arc::new(NoHaptics))
    }

    pub fn with_haptics(answer: GateAnswer, haptics: Arc<dyn Haptics>) -> Self {
        Self::build(answer, CallConfig::default(), haptics)
    }

    fn build(answer: GateAnswer, config: CallConfig, haptics: Arc<dyn Haptics>) -> Self {
        let log = EventLog::default();
        let registry = PlaybackRegistry::new();
        let output = Arc::new(FakeOutput::new(log.clone()));
        let gate = Arc::new(RecordingGate::new(log.clone(), answer));
        let handoff = Arc::new(RecordingHandoff {
            log: log.clone(),
            calls: Mutex::new(Vec::new()),
        });
        let (inner, _tx, _rx) = LoopbackTransport::new();
        let transport = Arc::new(RecordingTransport {
            log: log.clone(),
            inner,
            hold_sends: Mutex::new(None),
            send_held: Notify::new(),
        });

        let devices =
            DeviceCapabilities::new(output.clone(), gate.clone()).with_haptics(haptics);
        let manager = CallManager::new(
            config,
            transport.clone(),
            registry.clone(),
            devices,
            handoff.clone(),
        );
        let handler = CallSignalHandler::new(manager.clone());

        Self {
            log,
            registry,
            output,
            gate,
            handoff,
            transport,
            manager,
            handler,
        }
    }

    /// Register a voice-reel style player that logs `<id>.stop` when silenced.
    pub fn register_player(&self, player_id: &str) {
        let log = self.log.clone();
        let entry = format!("{player_id}.stop");
        self.registry.register(
            player_id,
            stop_fn(move || {
                let log = log.clone();
                let entry = entry.clone();
                async move {
                    log.push(entry);
                    Ok(())
                }
            }),
        );
    }

    pub async fn deliver(&self, frame: &str) -> bool {
        self.handler.handle_frame(frame).await
    }

    pub async fn ring(&self, call_id: &str, caller_id: &str) {
        assert!(self.deliver(&offer_frame(call_id, caller_id)).await);
    }

    pub fn handoffs(&self) -> Vec<HandoffParams> {
        self.handoff.calls.lock().unwrap().clone()
    }
}

pub fn offer_frame(call_id: &str, caller_id: &str) -> String {
    serde_json::json!({
        "type": "incoming_call",
        "callId": call_id,
        "callerId": caller_id,
        "caller": {
            "id": caller_id,
            "username": "ana",
            "displayName": "Ana",
            "avatarUrl": "https://cdn.example.com/ana.png"
        }
    })
    .to_string()
}

pub fn ended_frame(call_id: &str) -> String {
    serde_json::json!({ "type": "call_ended", "callId": call_id }).to_string()
}

pub fn declined_frame(call_id: &str) -> String {
    serde_json::json!({ "type": "call_declined", "callId": call_id }).to_string()
}
