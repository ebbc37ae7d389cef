//! Error types for topology construction and asset loading

use std::path::PathBuf;
use thiserror::Error;

/// Spatialization error types
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Too few usable speakers for the requested mode
    #[error("Not enough speakers: need at least {needed}, got {got}")]
    NotEnoughSpeakers { needed: usize, got: usize },

    /// Speakers are placed so that no panning set can be formed
    #[error("Degenerate speaker layout: {0}")]
    DegenerateLayout(String),

    /// Two speakers share an identifier
    #[error("Duplicate speaker id: {0}")]
    DuplicateSpeaker(u32),

    /// HRTF impulse response file not found
    #[error("HRTF file missing: {0}")]
    HrtfMissing(PathBuf),

    /// HRTF data present but unusable
    #[error("Invalid HRTF data: {0}")]
    HrtfInvalid(String),

    /// WAV decoding error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
