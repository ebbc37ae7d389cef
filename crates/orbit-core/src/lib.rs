//! orbit-core: Shared types for the Orbit spatialization engine
//!
//! Positions in both polar and cartesian form, the control-side session
//! model (sources, speakers, project settings) and decibel helpers.

mod error;
mod position;
mod session;
mod units;

pub use error::*;
pub use position::*;
pub use session::*;
pub use units::*;

/// Gains below this are treated as silence
pub const SMALL_GAIN: f32 = 1e-13;

/// Largest block the render path is sized for by default
pub const MAX_BLOCK_SIZE: usize = 2048;

/// Number of virtual speakers used by binaural rendering
pub const BINAURAL_VIRTUAL_SPEAKERS: usize = 16;

/// Impulse response length (taps) of each HRTF filter
pub const HRTF_TAPS: usize = 128;
