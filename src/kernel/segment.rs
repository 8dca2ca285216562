use serde::{Deserialize, Serialize};

/// One of the two narrated audio tracks of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Original,
    Translation,
}

impl Track {
    pub fn other(self) -> Self {
        match self {
            Track::Original => Track::Translation,
            Track::Translation => Track::Original,
        }
    }

    /// Wire name used by heartbeats and manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Original => "original",
            Track::Translation => "translation",
        }
    }
}

/// A (track, time-range, sentence) unit of the playback plan.
/// Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub track: Track,
    pub start: f64,
    pub end: f64,
    pub sentence_index: usize,
}

impl Segment {
    pub fn new(track: Track, start: f64, end: f64, sentence_index: usize) -> Self {
        Self {
            track,
            start,
            end,
            sentence_index,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}
