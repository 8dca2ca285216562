use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kernel::event::{Intent, PlaybackStatus};

/// Static metadata for the system media controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    pub elapsed: f64,
    pub duration: f64,
    /// 0.0 while paused so the OS stops extrapolating elapsed time.
    pub rate: f32,
}

/// System-level now-playing surface (MPNowPlayingInfoCenter, MPRIS, SMTC).
pub trait NowPlayingCenter: Send {
    fn publish(&mut self, info: &NowPlayingInfo);
    fn clear(&mut self);
}

/// Commands received from lock screen, headset or media keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(f64),
    /// Seconds; `None` uses the configured skip interval.
    SkipForward(Option<f64>),
    SkipBackward(Option<f64>),
}

/// Elapsed drift that justifies a republish while nothing else changed.
const ELAPSED_DRIFT: f64 = 1.0;

pub struct NowPlayingBridge<C: NowPlayingCenter> {
    center: C,
    metadata: Option<TrackMetadata>,
    last: Option<NowPlayingInfo>,
    skip_interval: f64,
}

impl<C: NowPlayingCenter> NowPlayingBridge<C> {
    pub fn new(center: C, skip_interval: f64) -> Self {
        Self {
            center,
            metadata: None,
            last: None,
            skip_interval,
        }
    }

    pub fn set_metadata(&mut self, metadata: Option<TrackMetadata>) {
        self.metadata = metadata;
        self.last = None;
    }

    /// Forward the status if it changed meaningfully. Returns true if published.
    pub fn update(&mut self, status: &PlaybackStatus) -> bool {
        let Some(meta) = &self.metadata else {
            return false;
        };

        let duration = if status.duration.is_finite() { status.duration.max(0.0) } else { 0.0 };
        let mut elapsed = status.current_time.max(0.0);
        if duration > 0.0 {
            elapsed = elapsed.min(duration);
        }
        let info = NowPlayingInfo {
            title: meta.title.clone(),
            artist: meta.artist.clone(),
            artwork_url: meta.artwork_url.clone(),
            elapsed,
            duration,
            rate: if status.is_playing { status.rate } else { 0.0 },
        };

        let changed = match &self.last {
            None => true,
            Some(last) => {
                last.title != info.title
                    || last.artist != info.artist
                    || last.artwork_url != info.artwork_url
                    || last.rate != info.rate
                    || (last.duration - info.duration).abs() > f64::EPSILON
                    || (last.elapsed - info.elapsed).abs() >= ELAPSED_DRIFT
            }
        };
        if !changed {
            return false;
        }

        self.center.publish(&info);
        self.last = Some(info);
        true
    }

    pub fn clear(&mut self) {
        self.metadata = None;
        self.last = None;
        self.center.clear();
    }

    pub fn command_to_intent(&self, command: RemoteCommand) -> Intent {
        debug!("Remote command {:?}", command);
        match command {
            RemoteCommand::Play => Intent::Play,
            RemoteCommand::Pause => Intent::Pause,
            RemoteCommand::Toggle => Intent::PlayToggle,
            RemoteCommand::Next => Intent::Next,
            RemoteCommand::Previous => Intent::Previous,
            RemoteCommand::Seek(to) => Intent::SeekTo(to),
            RemoteCommand::SkipForward(by) => Intent::SkipBy(by.unwrap_or(self.skip_interval)),
            RemoteCommand::SkipBackward(by) => Intent::SkipBy(-by.unwrap_or(self.skip_interval)),
        }
    }

    pub fn center(&self) -> &C {
        &self.center
    }
}

/// Center that only logs; for headless runs.
#[derive(Debug, Default)]
pub struct LogCenter;

impl NowPlayingCenter for LogCenter {
    fn publish(&mut self, info: &NowPlayingInfo) {
        tracing::info!(
            "[NOW PLAYING] {} {:.1}/{:.1}s x{}",
            info.title,
            info.elapsed,
            info.duration,
            info.rate
        );
    }

    fn clear(&mut self) {
        tracing::info!("[NOW PLAYING] cleared");
    }
}
