//! Playback telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (controller, adapter or reactor).
//! It exists solely for observability and verification.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain reading content (text, urls, titles).
//! Only segment/sentence indices, tracks and counts are allowed.

pub mod event;
pub mod metrics;
pub mod recorder;
