//! Distance attenuation for field panning
//!
//! Sources beyond the near distance are turned down and darkened. Both the
//! gain and the lowpass coefficient are interpolated across each block so
//! fast moves do not click.

use orbit_core::{LbapAttenuation, db_to_gain};
use std::f32::consts::PI;

/// Lowpass cutoff used when a source sits at the near distance
const OPEN_CUTOFF_HZ: f32 = 20_000.0;

/// Immutable attenuation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationConfig {
    near: f32,
    far: f32,
    /// Attenuation at the far distance, always <= 0
    max_attenuation_db: f32,
    open_cutoff: f32,
    far_cutoff: f32,
    sample_rate: f32,
}

/// Per-source ramp and filter memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationState {
    last_gain: f32,
    last_coeff: f32,
    lowpass_y: f32,
}

impl Default for AttenuationState {
    fn default() -> Self {
        Self {
            last_gain: 1.0,
            last_coeff: 0.0,
            lowpass_y: 0.0,
        }
    }
}

impl AttenuationConfig {
    pub fn new(settings: &LbapAttenuation, sample_rate: f32) -> Self {
        let nyquist_guard = sample_rate * 0.45;
        let open_cutoff = OPEN_CUTOFF_HZ.min(nyquist_guard);
        Self {
            near: settings.near.max(0.0),
            far: settings.far.max(settings.near.max(0.0)),
            max_attenuation_db: -settings.attenuation_db.abs(),
            open_cutoff,
            far_cutoff: settings.freq_hz.clamp(20.0, open_cutoff),
            sample_rate,
        }
    }

    /// Whether the stage changes the signal at all
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.max_attenuation_db < 0.0
    }

    /// 0 at or inside `near`, 1 at or beyond `far`
    fn amount(&self, distance: f32) -> f32 {
        if distance <= self.near {
            0.0
        } else if distance >= self.far || self.far <= self.near {
            1.0
        } else {
            (distance - self.near) / (self.far - self.near)
        }
    }

    /// Gain for a source at `distance`, non-increasing with distance
    pub fn gain_at(&self, distance: f32) -> f32 {
        db_to_gain(self.max_attenuation_db * self.amount(distance))
    }

    /// One-pole lowpass feedback coefficient at `distance`, 0 = bypass
    pub fn coeff_at(&self, distance: f32) -> f32 {
        let t = self.amount(distance);
        if t == 0.0 {
            return 0.0;
        }
        let cutoff = self.open_cutoff * (self.far_cutoff / self.open_cutoff).powf(t);
        (-2.0 * PI * cutoff / self.sample_rate).exp()
    }

    /// Attenuate `samples` in place for a source at `distance`
    pub fn process(&self, samples: &mut [f32], distance: f32, state: &mut AttenuationState) {
        if !self.is_enabled() || samples.is_empty() {
            return;
        }

        let target_gain = self.gain_at(distance);
        let target_coeff = self.coeff_at(distance);
        let step = 1.0 / samples.len() as f32;
        let gain_slope = (target_gain - state.last_gain) * step;
        let coeff_slope = (target_coeff - state.last_coeff) * step;

        let mut gain = state.last_gain;
        let mut coeff = state.last_coeff;
        let mut y = state.lowpass_y;
        for sample in samples.iter_mut() {
            gain += gain_slope;
            coeff += coeff_slope;
            y = *sample + coeff * (y - *sample);
            *sample = y * gain;
        }

        state.last_gain = target_gain;
        state.last_coeff = target_coeff;
        state.lowpass_y = y;
    }
}
