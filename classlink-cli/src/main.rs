use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use classlink::mesh::capture::SyntheticCaptureDevice;
use classlink::mesh::{
    LocalTrack, MemoryRelay, MeshConfig, RtcTransportFactory, SessionContext, SessionDeps,
    SessionEvent, SessionOrchestrator, SessionSnapshot,
};
use classlink::model::{ConnectionState, MediaKind, ParticipantId, SessionId};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// One 20ms Opus frame of silence.
const OPUS_SILENCE: [u8; 3] = [0xF8, 0xFF, 0xFE];
const FRAME: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "classlink", version, about = "Peer-to-peer classroom media mesh")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a presenter and several viewers in-process over an in-memory relay.
    Demo {
        #[arg(short, long, default_value_t = 2)]
        viewers: usize,

        /// JSON configuration file; defaults apply to missing fields.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seconds to keep the classroom running.
        #[arg(short, long, default_value_t = 10)]
        duration: u64,
    },

    /// Print the default configuration as JSON.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Demo {
            viewers,
            config,
            duration,
        } => run_demo(viewers, config, Duration::from_secs(duration)).await,

        Commands::Config => {
            let json = serde_json::to_string_pretty(&MeshConfig::default())?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn run_demo(viewers: usize, config: Option<PathBuf>, duration: Duration) -> Result<()> {
    let config = match config {
        Some(path) => MeshConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MeshConfig::default(),
    };

    println!(
        "{}",
        format!("🚀 Starting classroom with {viewers} viewer(s)...")
            .green()
            .bold()
    );

    let relay = Arc::new(MemoryRelay::new());
    let factory = Arc::new(RtcTransportFactory::new(config.transport.clone()));
    let session = SessionId::new();
    let presenter = ParticipantId::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut participants = Vec::with_capacity(viewers + 1);
    participants.push(
        spawn_participant(
            "presenter".to_string(),
            SessionContext::presenter(session.clone(), presenter.clone()),
            &config,
            &relay,
            &factory,
            shutdown_rx.clone(),
        )
        .await?,
    );
    for i in 1..=viewers {
        participants.push(
            spawn_participant(
                format!("viewer-{i}"),
                SessionContext::viewer(session.clone(), ParticipantId::new(), presenter.clone()),
                &config,
                &relay,
                &factory,
                shutdown_rx.clone(),
            )
            .await?,
        );
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => println!("{}", "⏹  Interrupted".yellow()),
    }
    let _ = shutdown_tx.send(true);

    let mut snapshots = Vec::with_capacity(participants.len());
    for participant in participants {
        snapshots.push(participant.await??);
    }

    let connected = snapshots
        .first()
        .map(|presenter| {
            presenter
                .peers
                .iter()
                .filter(|p| p.connection_state == ConnectionState::Connected)
                .count()
        })
        .unwrap_or_default();

    println!(
        "{}",
        format!("✨ {connected}/{viewers} viewer(s) were connected at shutdown")
            .green()
            .bold()
    );
    println!("   📨 Relay messages published: {}", relay.published_count());
    println!("   📭 Left unacknowledged:      {}", relay.pending_count());
    Ok(())
}

async fn spawn_participant(
    label: String,
    ctx: SessionContext,
    config: &MeshConfig,
    relay: &Arc<MemoryRelay>,
    factory: &Arc<RtcTransportFactory>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<Result<SessionSnapshot>>> {
    let device = Arc::new(SyntheticCaptureDevice::new());
    let deps = SessionDeps {
        signaling: relay.clone(),
        capture: device.clone(),
        transports: factory.clone(),
    };
    let mut handle = SessionOrchestrator::enter(ctx, config.clone(), deps).await?;

    Ok(tokio::spawn(async move {
        let mut pump: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                event = handle.next_event() => {
                    let Some(event) = event else { break };
                    if matches!(event, SessionEvent::LocalMediaReady { .. }) {
                        pump = device
                            .last_user_control()
                            .map(|control| spawn_audio_pump(control.tracks().to_vec()));
                    }
                    report(&label, &event);
                }
                _ = shutdown.changed() => break,
            }
        }

        let snapshot = handle.snapshot().await?;
        handle.leave().await?;
        if let Some(pump) = pump {
            pump.abort();
        }
        Ok(snapshot)
    }))
}

fn spawn_audio_pump(tracks: Vec<Arc<LocalTrack>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME);
        loop {
            ticker.tick().await;
            for track in tracks.iter().filter(|t| t.kind() == MediaKind::Audio) {
                if track.is_ended() {
                    return;
                }
                if let Err(e) = track
                    .write_frame(Bytes::from_static(&OPUS_SILENCE), FRAME)
                    .await
                {
                    debug!("Audio frame dropped: {:#}", e);
                }
            }
        }
    })
}

fn report(label: &str, event: &SessionEvent) {
    let label = label.bold();
    match event {
        SessionEvent::LocalMediaReady { audio, video } => {
            println!("🎙  {label}: local media ready (audio: {audio}, video: {video})")
        }
        SessionEvent::LocalMediaUnavailable { error } => println!(
            "{}",
            format!("🙈 {label}: joining receive-only ({error})").yellow()
        ),
        SessionEvent::PeerConnected { remote } => {
            println!("{}", format!("🔗 {label}: connected to {remote}").green())
        }
        SessionEvent::PeerDisconnected { remote } => {
            println!("{}", format!("💔 {label}: lost {remote}").yellow())
        }
        SessionEvent::RemoteStreamAdded { remote, stream } => println!(
            "{}",
            format!(
                "🎥 {label}: receiving {} track(s) from {remote}",
                stream.tracks.len()
            )
            .cyan()
        ),
        SessionEvent::NegotiationFailed { error } => {
            println!("{}", format!("❌ {label}: {error}").red())
        }
        SessionEvent::PublishFailed { error } => {
            println!("{}", format!("❌ {label}: {error}").red())
        }
        SessionEvent::JoinRequested => println!("{}", format!("👋 {label}: join request sent").dimmed()),
        SessionEvent::OfferSent { remote } => {
            println!("{}", format!("📤 {label}: offer sent to {remote}").dimmed())
        }
        other => println!("{}", format!("   {label}: {other:?}").dimmed()),
    }
}
