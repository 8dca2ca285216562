//! Error taxonomy for interlinear.
//!
//! Only transport and persistent media-load failures are errors. Clock
//! jitter, interruptions and cancellation are handled by the playback
//! state machines and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status from the API collaborator.
    #[error("Transport error: status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Transport { status: u16, message: Option<String> },

    /// Connection, timeout or body read failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Media file failed to load or decode. No automatic retry.
    #[error("Media error: {0}")]
    Media(String),

    /// Manifest payload missing required structure.
    #[error("Manifest error: {0}")]
    Manifest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
