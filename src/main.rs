use async_trait::async_trait;
use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use ringline::calls::{CallHandoff, CallManager, CallSignalHandler, PermissionGate, PermissionStatus};
use ringline::device::{AudioOutput, AudioSessionMode, DeviceCapabilities, HapticKind, Haptics, Sound};
use ringline::handoff::HandoffParams;
use ringline::playback::{PlaybackRegistry, stop_fn};
use ringline::transport::{LoopbackTransport, TransportEvent};
use ringline::CallConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Replays a scripted incoming call against the call core, with logging
// stand-ins for the audio device, the permission prompt and navigation.
//
// Usage:
//   cargo run                                   # accept with permission granted
//   cargo run -- --scenario decline
//   cargo run -- -s remote-end
//   cargo run -- -s permission-error
//   cargo run -- -s busy --config call.json

const REEL_PLAYER_ID: &str = "voice-reel-1";
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ringline")]
#[command(about = "Replay a scripted incoming-call session")]
struct Cli {
    #[arg(short, long, value_enum, default_value_t = Scenario::Accept)]
    scenario: Scenario,

    /// JSON call configuration; defaults apply to missing fields.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Accept,
    Decline,
    RemoteEnd,
    PermissionError,
    Busy,
}

struct LogSound {
    resource: String,
}

#[async_trait]
impl Sound for LogSound {
    async fn play_looping(&self) -> Result<(), anyhow::Error> {
        info!(target: "Demo/Audio", "Looping {}", self.resource);
        Ok(())
    }

    async fn stop(&self) -> Result<(), anyhow::Error> {
        info!(target: "Demo/Audio", "Stopped {}", self.resource);
        Ok(())
    }

    async fn unload(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

struct LogAudioOutput;

#[async_trait]
impl AudioOutput for LogAudioOutput {
    async fn configure_session(&self, mode: AudioSessionMode) -> Result<(), anyhow::Error> {
        info!(target: "Demo/Audio", "Audio session mode: {mode:?}");
        Ok(())
    }

    async fn load(&self, resource: &str) -> Result<Arc<dyn Sound>, anyhow::Error> {
        Ok(Arc::new(LogSound {
            resource: resource.to_string(),
        }))
    }
}

struct DemoPermissionGate {
    fail: bool,
}

#[async_trait]
impl PermissionGate for DemoPermissionGate {
    async fn request_audio_capture_permission(&self) -> Result<PermissionStatus, anyhow::Error> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if self.fail {
            anyhow::bail!("microphone permission service crashed");
        }
        Ok(PermissionStatus::GRANTED)
    }
}

struct LogHaptics;

impl Haptics for LogHaptics {
    fn trigger(&self, kind: HapticKind) {
        info!(target: "Demo/Haptics", "Buzz: {kind:?}");
    }
}

struct LogHandoff;

#[async_trait]
impl CallHandoff for LogHandoff {
    async fn hand_off(&self, params: HandoffParams) -> Result<(), anyhow::Error> {
        info!(target: "Demo/Navigation", "Navigate to call screen: {}", serde_json::to_string(&params)?);
        Ok(())
    }
}

fn incoming_call_frame(call_id: &str, caller_id: &str, name: &str) -> TransportEvent {
    TransportEvent::TextReceived(
        serde_json::json!({
            "type": "incoming_call",
            "callId": call_id,
            "callerId": caller_id,
            "caller": {
                "id": caller_id,
                "username": name.to_lowercase(),
                "displayName": name,
                "avatarUrl": null
            }
        })
        .to_string(),
    )
}

fn load_config(path: Option<&PathBuf>) -> Result<CallConfig, anyhow::Error> {
    match path {
        Some(path) => Ok(CallConfig::from_json_str(&std::fs::read_to_string(path)?)?),
        None => Ok(CallConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let ringtone_id = config.ringtone_player_id.clone();

    let registry = PlaybackRegistry::new();
    registry.register(
        REEL_PLAYER_ID,
        stop_fn(|| async {
            info!(target: "Demo/Audio", "Voice reel paused");
            Ok(())
        }),
    );
    registry.request_playback(REEL_PLAYER_ID).await;
    info!("Voice reel playing before the call arrives");

    let (transport, inbound, events) = LoopbackTransport::new();
    let devices = DeviceCapabilities::new(
        Arc::new(LogAudioOutput),
        Arc::new(DemoPermissionGate {
            fail: cli.scenario == Scenario::PermissionError,
        }),
    )
    .with_haptics(Arc::new(LogHaptics));

    let manager = CallManager::new(
        config,
        transport.clone(),
        registry.clone(),
        devices,
        Arc::new(LogHandoff),
    );
    let mut resolved = manager.events().call_resolved.subscribe();
    let pump = CallSignalHandler::spawn(manager.clone(), events);

    inbound.send(TransportEvent::Connected).await?;
    inbound.send(incoming_call_frame("c1", "u2", "Ana")).await?;

    let mut active = registry.subscribe();
    tokio::time::timeout(
        STEP_TIMEOUT,
        active.wait_for(|player| player.as_deref() == Some(ringtone_id.as_str())),
    )
    .await??;
    info!("Phone is ringing");

    match cli.scenario {
        Scenario::Accept | Scenario::PermissionError => {
            let outcome = manager.accept().await?;
            info!("Accept finished: {outcome:?}");
        }
        Scenario::Decline => manager.decline().await?,
        Scenario::RemoteEnd => {
            inbound
                .send(TransportEvent::TextReceived(
                    r#"{"type":"call_ended","callId":"c1"}"#.to_string(),
                ))
                .await?;
        }
        Scenario::Busy => {
            let mut busy = manager.events().call_busy.subscribe();
            inbound
                .send(TransportEvent::TextReceived("{garbage".to_string()))
                .await?;
            inbound.send(incoming_call_frame("c2", "u3", "Bruno")).await?;
            let event = tokio::time::timeout(STEP_TIMEOUT, busy.recv()).await??;
            info!("Offer {} from {} rejected as busy", event.call_id, event.caller_id);
            manager.decline().await?;
        }
    }

    match tokio::time::timeout(STEP_TIMEOUT, resolved.recv()).await {
        Ok(Ok(event)) => info!("Call {} resolved: {:?}", event.call_id, event.outcome),
        Ok(Err(e)) => warn!("Event bus closed: {e}"),
        Err(_) => warn!("Call did not resolve within {STEP_TIMEOUT:?}"),
    }

    for frame in transport.sent() {
        info!("Sent frame: {frame}");
    }
    info!("Active player after the call: {:?}", registry.active_player());

    manager.shutdown().await;
    pump.await?;
    registry.stop_all().await;
    Ok(())
}
