use serde::{Deserialize, Serialize};

use super::segment::{Segment, Track};

/// Per-sentence time gates as delivered by the manifest.
/// Either pair may be missing; an invalid pair simply yields no segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentenceGates {
    pub original_start: Option<f64>,
    pub original_end: Option<f64>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl SentenceGates {
    pub fn new(original: Option<(f64, f64)>, translation: Option<(f64, f64)>) -> Self {
        Self {
            original_start: original.map(|g| g.0),
            original_end: original.map(|g| g.1),
            start: translation.map(|g| g.0),
            end: translation.map(|g| g.1),
        }
    }

    pub fn gate(&self, track: Track) -> Option<(f64, f64)> {
        let (start, end) = match track {
            Track::Original => (self.original_start?, self.original_end?),
            Track::Translation => (self.start?, self.end?),
        };
        if start.is_finite() && end.is_finite() && start >= 0.0 && end > start {
            Some((start, end))
        } else {
            None
        }
    }
}

/// Which tracks the user has switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioMode {
    /// Both tracks active, played sentence by sentence.
    #[default]
    Sequence,
    /// Only one track, played as a whole file.
    SingleTrack(Track),
}

impl AudioMode {
    pub fn track_enabled(&self, track: Track) -> bool {
        match self {
            AudioMode::Sequence => true,
            AudioMode::SingleTrack(t) => *t == track,
        }
    }

    /// Track played when sequence mode is off.
    pub fn fallback_track(&self) -> Track {
        match self {
            AudioMode::Sequence => Track::Original,
            AudioMode::SingleTrack(t) => *t,
        }
    }
}

/// One audio file of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub url: String,
    pub duration: Option<f64>,
}

/// The files of one track, played back to back as a single timeline.
/// Gate times are offsets on that timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMedia {
    pub files: Vec<MediaFile>,
}

impl TrackMedia {
    pub fn single(url: impl Into<String>, duration: Option<f64>) -> Self {
        Self {
            files: vec![MediaFile {
                url: url.into(),
                duration,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.files.iter().map(|f| f.url.clone()).collect()
    }

    /// Per-file durations. `None` unless every file reports a usable one.
    pub fn file_durations(&self) -> Option<Vec<f64>> {
        if self.files.is_empty() {
            return None;
        }
        self.files
            .iter()
            .map(|f| f.duration.filter(|d| d.is_finite() && *d > 0.0))
            .collect()
    }

    /// Length of the whole timeline.
    pub fn duration(&self) -> Option<f64> {
        self.file_durations().map(|d| d.iter().sum())
    }
}

/// Everything needed to (re)build a plan for a playback session.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub sentences: Vec<SentenceGates>,
    pub original: TrackMedia,
    pub translation: TrackMedia,
    pub mode: AudioMode,
}

impl PlanRequest {
    pub fn media(&self, track: Track) -> Option<&TrackMedia> {
        let media = match track {
            Track::Original => &self.original,
            Track::Translation => &self.translation,
        };
        (!media.is_empty()).then_some(media)
    }

    pub fn duration(&self, track: Track) -> Option<f64> {
        self.media(track).and_then(TrackMedia::duration)
    }
}

/// Ordered, gapless playback order.
///
/// Segments of one sentence are contiguous and the original segment always
/// precedes the translation segment of the same sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    segments: Vec<Segment>,
}

impl Plan {
    pub fn build(
        sentences: &[SentenceGates],
        original_duration: Option<f64>,
        translation_duration: Option<f64>,
    ) -> Self {
        let mut segments = Vec::with_capacity(sentences.len() * 2);
        for (index, gates) in sentences.iter().enumerate() {
            for track in [Track::Original, Track::Translation] {
                if let Some((start, end)) = gates.gate(track) {
                    segments.push(Segment::new(track, start, end, index));
                }
            }
        }

        // A lone sentence without gates still plays its whole track.
        if sentences.len() == 1 {
            let gates = &sentences[0];
            if gates.gate(Track::Original).is_none() {
                if let Some(d) = original_duration.filter(|d| d.is_finite() && *d > 0.0) {
                    segments.insert(0, Segment::new(Track::Original, 0.0, d, 0));
                }
            }
            if gates.gate(Track::Translation).is_none() {
                if let Some(d) = translation_duration.filter(|d| d.is_finite() && *d > 0.0) {
                    segments.push(Segment::new(Track::Translation, 0.0, d, 0));
                }
            }
        }

        Self { segments }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_track(&self, track: Track) -> bool {
        self.segments.iter().any(|s| s.track == track)
    }

    pub fn segments_for_sentence(&self, sentence: usize) -> impl Iterator<Item = (usize, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.sentence_index == sentence)
    }

    /// Distinct sentence indices in plan order.
    pub fn sentence_indices(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for segment in &self.segments {
            if out.last() != Some(&segment.sentence_index) {
                out.push(segment.sentence_index);
            }
        }
        out
    }

    /// Sentence spoken at `time` within `track`. Resolves displayed
    /// sentences and user seek targets; reported playback time never goes
    /// through here to move the sequence cursor.
    pub fn sentence_at(&self, track: Track, time: f64) -> Option<usize> {
        let mut last_started = None;
        for segment in self.segments.iter().filter(|s| s.track == track) {
            if segment.contains(time) {
                return Some(segment.sentence_index);
            }
            if segment.start <= time {
                last_started = Some(segment.sentence_index);
            }
        }
        last_started
    }

    /// Sequence mode requires both urls, segments on both tracks and both
    /// tracks switched on.
    pub fn sequence_eligible(&self, request: &PlanRequest) -> bool {
        request.media(Track::Original).is_some()
            && request.media(Track::Translation).is_some()
            && self.has_track(Track::Original)
            && self.has_track(Track::Translation)
            && request.mode.track_enabled(Track::Original)
            && request.mode.track_enabled(Track::Translation)
    }
}
