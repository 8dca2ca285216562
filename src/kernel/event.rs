use serde::{Deserialize, Serialize};

use super::plan::PlanRequest;
use super::registry::OwnerId;
use super::segment::Track;
use crate::engine::backend::BackendEvent;
use crate::outputs::now_playing::{RemoteCommand, TrackMetadata};

/// Everything the reactor consumes, serialized through one channel.
#[derive(Debug, Clone)]
pub enum Event {
    /// Start a new playback session.
    Load(Box<SessionRequest>),
    /// Raw callback from the platform media engine.
    Engine(BackendEvent),
    /// Time-observer cadence.
    TimeTick,
    /// Dwell timer fired.
    DwellElapsed { generation: u64 },
    Intent(Intent),
    /// OS media-control command.
    Remote(RemoteCommand),
    /// Another session took primary audio.
    Preempted { by: OwnerId },
    /// End the session, keep the reactor alive.
    Stop,
    /// End the reactor loop.
    Shutdown,
}

/// High-level commands from the UI/navigation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    First,
    Previous,
    PlayToggle,
    Play,
    Pause,
    Next,
    Last,
    SeekToSentence { sentence: usize, track: Option<Track> },
    JumpToChapter { start_sentence: usize },
    ResumeAt(ResumePosition),
    /// Absolute time within the active track.
    SeekTo(f64),
    /// Relative seek in seconds, negative for backward.
    SkipBy(f64),
    SetRate(f32),
    SetVolume(f32),
}

/// Opaque resume target handed over by the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumePosition {
    pub sentence_index: usize,
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub plan: PlanRequest,
    /// Attributes heartbeats; no heartbeats without it.
    pub job_id: Option<String>,
    pub metadata: Option<TrackMetadata>,
    pub auto_play: bool,
}

/// Observable playback state, republished after every reactor step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub rate: f32,
    pub current_track: Track,
    pub current_sentence_index: Option<usize>,
    pub is_dwelling: bool,
    pub is_same_sentence_track_switch: bool,
    pub sequence_enabled: bool,
    pub job_id: Option<String>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            rate: 1.0,
            current_track: Track::Original,
            current_sentence_index: None,
            is_dwelling: false,
            is_same_sentence_track_switch: false,
            sequence_enabled: false,
            job_id: None,
        }
    }
}

/// Callbacks delivered to the UI, in firing order, at most once each.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    WillBeginTransition,
    PausedForDwell,
    ResumedAfterDwell { time: f64 },
    TrackSwitched { track: Track, time: f64 },
    SequenceEnded,
    TimeStabilized,
    SeekRequested { time: f64 },
    MediaFailed { message: String },
}
