use serde::{Deserialize, Serialize};

use crate::kernel::segment::Track;

// Allowed: indices, tracks, counts, enums
// Forbidden: sentence text, media urls, metadata

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    PlanBuilt {
        segments: usize,
        sentences: usize,
        sequence_enabled: bool,
    },

    /// A tick inconsistent with the post-seek expected position.
    StaleTimeRejected {
        segment_index: usize,
    },

    /// Expected position dropped after too many stale ticks.
    StaleTimeAbandoned {
        segment_index: usize,
        resettled: bool,
    },

    SeekConfirmed {
        segment_index: usize,
    },

    SettlingTimeout {
        attempt: u32,
    },

    SettlingAbandoned,

    DwellStarted {
        segment_index: usize,
    },

    DwellCancelled,

    TrackSwitch {
        from: Track,
        to: Track,
        sentence_index: usize,
        same_sentence: bool,
    },

    SequenceEnded,
}
