//! Error types for Orbit

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum OrbitError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Source index {index} out of range ({count} sources)")]
    SourceOutOfRange { index: usize, count: usize },

    #[error("Speaker index {index} out of range ({count} speakers)")]
    SpeakerOutOfRange { index: usize, count: usize },

    #[error("Block size {got} exceeds maximum {max}")]
    BlockTooLarge { got: usize, max: usize },

    #[error("Expected {expected} {kind} buffers, got {got}")]
    ChannelMismatch {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Buffer holds {got} samples, block is {expected}")]
    BlockLengthMismatch { expected: usize, got: usize },
}

/// Result type alias
pub type OrbitResult<T> = Result<T, OrbitError>;
