//! Error types for the mixer and its backend client

use thiserror::Error;

use crate::player::Control;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("No media loaded")]
    NoSource,

    #[error("Output context is closed")]
    ContextClosed,

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Backend REST errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{detail} (HTTP {status})")]
    Backend { status: u16, detail: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Message suitable for a user-facing notification
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend { detail, .. } => detail.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Background track catalog errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("File size must be less than 10MB")]
    FileTooLarge(u64),

    #[error("Only .mp3 and .wav files are supported")]
    UnsupportedFileType(String),

    #[error("Unknown background track: {0}")]
    UnknownTrack(String),
}

/// Player and workflow errors
#[derive(Error, Debug, PartialEq)]
pub enum PlayerError {
    #[error("{0:?} is disabled for finalized audio")]
    ControlInert(Control),

    #[error("Unsupported playback speed: {0}")]
    UnsupportedSpeed(f64),

    #[error("No manifestation data found")]
    MissingManifestation,

    #[error("No voice audio generated yet")]
    MissingVoiceAudio,

    #[error("Player is not initialized")]
    NotInitialized,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
