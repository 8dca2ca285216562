//! Manifest decoding.
//!
//! Manifests come from several backend generations with different key
//! spellings. Every field is looked up through an explicit precedence list
//! and numbers may arrive as JSON numbers or numeric strings.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kernel::plan::{AudioMode, PlanRequest, SentenceGates, TrackMedia};

pub use crate::kernel::plan::MediaFile;

const ORIGINAL_START_KEYS: &[&str] = &["original_start_gate", "originalStartGate", "original_start"];
const ORIGINAL_END_KEYS: &[&str] = &["original_end_gate", "originalEndGate", "original_end"];
const TRANSLATION_START_KEYS: &[&str] = &["start_gate", "startGate", "start"];
const TRANSLATION_END_KEYS: &[&str] = &["end_gate", "endGate", "end"];
const SENTENCE_KEYS: &[&str] = &["sentences", "sentence_metadata", "sentenceMetadata"];
const URL_KEYS: &[&str] = &["url", "path", "relative_path"];

/// Media categories holding each track.
pub const ORIGINAL_CATEGORY: &str = "original";
pub const TRANSLATION_CATEGORY: &str = "translation";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub sentences: Vec<SentenceGates>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaManifest {
    pub media: HashMap<String, Vec<MediaFile>>,
    pub chunks: Vec<Chunk>,
    /// False while the job is still producing media.
    pub complete: bool,
}

impl MediaManifest {
    /// All sentences in chunk order; indices run across chunks.
    pub fn sentences(&self) -> Vec<SentenceGates> {
        self.chunks.iter().flat_map(|c| c.sentences.iter().copied()).collect()
    }

    /// First sentence index of every chunk, usable as chapter starts.
    pub fn chunk_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.chunks.len());
        let mut next = 0;
        for chunk in &self.chunks {
            starts.push(next);
            next += chunk.sentences.len();
        }
        starts
    }

    /// Every file of a category, in timeline order.
    pub fn track_media(&self, category: &str) -> TrackMedia {
        TrackMedia {
            files: self.media.get(category).cloned().unwrap_or_default(),
        }
    }

    pub fn plan_request(&self, mode: AudioMode) -> PlanRequest {
        PlanRequest {
            sentences: self.sentences(),
            original: self.track_media(ORIGINAL_CATEGORY),
            translation: self.track_media(TRANSLATION_CATEGORY),
            mode,
        }
    }
}

pub fn decode_manifest(value: &Value) -> Result<MediaManifest> {
    let root = value
        .as_object()
        .ok_or_else(|| Error::Manifest("manifest is not an object".to_string()))?;

    let mut media = HashMap::new();
    if let Some(categories) = root.get("media").and_then(Value::as_object) {
        for (category, files) in categories {
            let files: Vec<MediaFile> = files
                .as_array()
                .map(|files| files.iter().filter_map(decode_file).collect())
                .unwrap_or_default();
            media.insert(category.clone(), files);
        }
    }

    let chunks = match root.get("chunks") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(chunks)) => chunks.iter().map(decode_chunk).collect(),
        Some(_) => return Err(Error::Manifest("chunks is not an array".to_string())),
    };

    let complete = root.get("complete").and_then(Value::as_bool).unwrap_or(false);
    debug!("Decoded manifest: {} categories, {} chunks, complete {}", media.len(), chunks.len(), complete);

    Ok(MediaManifest { media, chunks, complete })
}

fn decode_file(value: &Value) -> Option<MediaFile> {
    let file = value.as_object()?;
    let url = URL_KEYS
        .iter()
        .find_map(|key| file.get(*key).and_then(Value::as_str))
        .filter(|url| !url.is_empty())?
        .to_string();
    Some(MediaFile {
        url,
        duration: number_field(file, &["duration"]),
    })
}

fn decode_chunk(value: &Value) -> Chunk {
    let sentences: Vec<SentenceGates> = value
        .as_object()
        .and_then(|chunk| SENTENCE_KEYS.iter().find_map(|key| chunk.get(*key).and_then(Value::as_array)))
        .map(|sentences| sentences.iter().map(decode_gates).collect())
        .unwrap_or_default();
    Chunk { sentences }
}

/// A sentence without usable gates still occupies its index.
fn decode_gates(value: &Value) -> SentenceGates {
    let Some(sentence) = value.as_object() else {
        return SentenceGates::default();
    };
    SentenceGates {
        original_start: number_field(sentence, ORIGINAL_START_KEYS),
        original_end: number_field(sentence, ORIGINAL_END_KEYS),
        start: number_field(sentence, TRANSLATION_START_KEYS),
        end: number_field(sentence, TRANSLATION_END_KEYS),
    }
}

fn number_field(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| object.get(*key).and_then(number))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
