//! Two-channel panning
//!
//! A VBAP pair of virtual speakers at -45 and +45 degrees. The source
//! azimuth is folded onto the frontal half circle and halved, so a full
//! turn around the listener sweeps left to right and back with constant
//! power.

use crate::{SpatialResult, VbapTopology};
use orbit_core::Position;

/// Output index of the left channel in the gain vector
pub const LEFT: usize = 0;
/// Output index of the right channel in the gain vector
pub const RIGHT: usize = 1;

const VIRTUAL_AZIMUTH: f32 = 45.0;

/// Loudness compensation for `active_sources` summed into two channels
#[inline]
pub fn stereo_compensation(active_sources: usize) -> f32 {
    let extra = active_sources.saturating_sub(1) as f32;
    10.0_f32.powf(extra * -0.005)
}

/// Stereo panner
#[derive(Debug, Clone)]
pub struct StereoPanner {
    pair: VbapTopology,
}

impl StereoPanner {
    pub fn new() -> SpatialResult<Self> {
        let pair = VbapTopology::from_positions(
            &[
                (LEFT, Position::from_polar(-VIRTUAL_AZIMUTH, 0.0, 1.0)),
                (RIGHT, Position::from_polar(VIRTUAL_AZIMUTH, 0.0, 1.0)),
            ],
            2,
        )?;
        Ok(Self { pair })
    }

    /// Fill `gains[LEFT]` and `gains[RIGHT]`
    pub fn compute_gains(&self, position: &Position, gains: &mut [f32]) {
        let azimuth = position.azimuth();
        let folded = if azimuth > 90.0 {
            180.0 - azimuth
        } else if azimuth < -90.0 {
            -180.0 - azimuth
        } else {
            azimuth
        };
        let panned = Position::from_polar(folded * 0.5, 0.0, 1.0);
        let mut last = None;
        self.pair.compute_gains(&panned, &mut last, gains);
    }
}
