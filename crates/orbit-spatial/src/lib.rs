//! orbit-spatial: Speaker topologies and panning algorithms
//!
//! Every algorithm answers the same question: given a source position,
//! what gain goes to each output channel. The topology for each is built
//! once per speaker-setup change on the control thread.
//!
//! - [`vbap`]: triangulated vector-base amplitude panning
//! - [`lbap`]: field panning by proximity inside the speaker volume
//! - [`hrtf`]: virtual dome plus HRTF convolution for headphones
//! - [`stereo`]: constant-power two-channel panning

pub mod algorithm;
pub mod error;
pub mod hrtf;
pub mod lbap;
pub mod stereo;
pub mod vbap;

pub use algorithm::SpatAlgorithm;
pub use error::{SpatialError, SpatialResult};
pub use hrtf::{BinauralState, HrtfBank};
pub use lbap::LbapField;
pub use stereo::{StereoPanner, stereo_compensation};
pub use vbap::{Dimension, SpeakerSet, VbapTopology};
