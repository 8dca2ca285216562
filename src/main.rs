use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use interlinear::config::Config;
use interlinear::engine::simulated::SimulatedBackend;
use interlinear::kernel::event::{Event, Intent, Notification, PlaybackStatus, SessionRequest};
use interlinear::kernel::heartbeat::{self, Heartbeat, HeartbeatAttribution, HeartbeatSink};
use interlinear::kernel::plan::AudioMode;
use interlinear::kernel::registry::PlaybackRegistry;
use interlinear::kernel::segment::Track;
use interlinear::outputs::now_playing::{LogCenter, TrackMetadata};
use interlinear::services::api::manifest::decode_manifest;
use interlinear::services::api::ApiClient;
use interlinear::Reactor;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Sequence,
    Original,
    Translation,
}

/// Play a media manifest through the sequence engine on a simulated player.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Manifest JSON file.
    manifest: PathBuf,
    /// TOML configuration file.
    #[arg(short, long, env = "INTERLINEAR_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "sequence")]
    mode: Mode,
    /// Attributes heartbeats to this job.
    #[arg(long)]
    job_id: Option<String>,
    /// Send heartbeats to the configured API instead of logging them.
    #[arg(long)]
    api: bool,
    /// Start at this chapter (manifest chunk, counted from 0).
    #[arg(long)]
    chapter: Option<usize>,
    #[arg(long, default_value = "orig")]
    original_language: String,
    #[arg(long, default_value = "trans")]
    translation_language: String,
}

/// Heartbeat sink for offline runs.
struct LogSink;

impl HeartbeatSink for LogSink {
    async fn send_heartbeat(&self, heartbeat: Heartbeat) -> interlinear::Result<()> {
        tracing::info!(
            "[HEARTBEAT] {} {} {:?} +{:.1}s",
            heartbeat.job_id,
            heartbeat.language,
            heartbeat.track_kind,
            heartbeat.delta_seconds
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    let raw = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("reading {}", args.manifest.display()))?;
    let manifest = decode_manifest(&serde_json::from_str(&raw)?)?;
    if !manifest.complete {
        tracing::warn!("Manifest is incomplete; playing what is available");
    }

    let mode = match args.mode {
        Mode::Sequence => AudioMode::Sequence,
        Mode::Original => AudioMode::SingleTrack(Track::Original),
        Mode::Translation => AudioMode::SingleTrack(Track::Translation),
    };
    let durations: HashMap<String, f64> = manifest
        .media
        .values()
        .flatten()
        .filter_map(|file| file.duration.map(|d| (file.url.clone(), d)))
        .collect();

    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::new(
        rx,
        tx.clone(),
        SimulatedBackend::realtime(durations),
        LogCenter,
        PlaybackRegistry::new(),
        config.clone(),
    );
    let mut notifications = reactor
        .take_notifications()
        .context("notification stream already taken")?;
    let status = reactor.subscribe_status();

    let cancel = CancellationToken::new();
    let languages = (args.original_language.clone(), args.translation_language.clone());
    let resolve = move |status: &PlaybackStatus| {
        let job_id = status.job_id.clone()?;
        let language = match status.current_track {
            Track::Original => languages.0.clone(),
            Track::Translation => languages.1.clone(),
        };
        Some(HeartbeatAttribution {
            job_id,
            language,
            track_kind: status.current_track,
        })
    };
    let heartbeat_task = if args.api {
        let client = ApiClient::new(&config.api)?;
        heartbeat::spawn(config.heartbeat.clone(), status, resolve, client, cancel.clone())
    } else {
        heartbeat::spawn(config.heartbeat.clone(), status, resolve, LogSink, cancel.clone())
    };

    let title = args.manifest.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    tx.send(Event::Load(Box::new(SessionRequest {
        plan: manifest.plan_request(mode),
        job_id: args.job_id.clone(),
        metadata: Some(TrackMetadata {
            title,
            ..TrackMetadata::default()
        }),
        auto_play: true,
    })))
    .await?;
    if let Some(chapter) = args.chapter {
        let starts = manifest.chunk_starts();
        let start_sentence = *starts
            .get(chapter)
            .with_context(|| format!("chapter {} out of range, manifest has {}", chapter, starts.len()))?;
        tx.send(Event::Intent(Intent::JumpToChapter { start_sentence })).await?;
    }

    let reactor_task = tokio::spawn(reactor.run());
    tracing::info!("Playing. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notification = notifications.recv() => match notification {
                Some(Notification::SequenceEnded) => {
                    tracing::info!("Sequence ended");
                    break;
                }
                Some(Notification::MediaFailed { message }) => {
                    tracing::error!("Playback failed: {}", message);
                    break;
                }
                Some(other) => tracing::info!("{:?}", other),
                None => break,
            },
        }
    }

    tx.send(Event::Shutdown).await?;
    reactor_task.await?;
    cancel.cancel();
    heartbeat_task.await?;
    Ok(())
}
