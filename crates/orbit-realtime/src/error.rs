//! Engine error types

use orbit_core::OrbitError;
use orbit_spatial::SpatialError;
use thiserror::Error;

/// Errors surfaced to the control thread
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid session or buffer shape
    #[error("Configuration error: {0}")]
    Config(#[from] OrbitError),

    /// Topology construction or HRTF loading failed
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Binaural rendering was requested but no HRTF bank was loaded
    #[error("Binaural mode requires an HRTF bank")]
    HrtfUnavailable,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
