//! orbit-dsp: Per-sample building blocks of the render path
//!
//! Everything here works on caller-owned slices and never allocates while
//! processing. Coefficients and state are kept apart: coefficients live in
//! the immutable audio configuration, state lives with the render pipeline.

pub mod attenuation;
pub mod crossover;
pub mod meter;
pub mod noise;
pub mod smoother;

pub use attenuation::{AttenuationConfig, AttenuationState};
pub use crossover::{HighpassCoeffs, HighpassState};
pub use meter::peak;
pub use noise::PinkNoise;
pub use smoother::{GainRamp, ramp_mix};
