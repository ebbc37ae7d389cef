//! Per-pair gain ramps
//!
//! Each (source, speaker) pair keeps a current gain that chases a target
//! gain one sample at a time while the source signal is mixed into the
//! speaker buffer.

use orbit_core::SMALL_GAIN;

/// Ramp law, chosen once per block from the interpolation setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainRamp {
    /// Straight line from current to target over exactly one block
    Linear,
    /// First-order approach: `current = target + (current - target) * factor`
    Exponential { factor: f32 },
}

impl GainRamp {
    /// Interpolation 0 selects the linear ramp, anything above selects the
    /// exponential ramp with `factor = k^0.1 * 0.0099 + 0.99`.
    pub fn from_interpolation(interpolation: f32) -> Self {
        let k = interpolation.clamp(0.0, 1.0);
        if k == 0.0 {
            Self::Linear
        } else {
            Self::Exponential {
                factor: k.powf(0.1) * 0.0099 + 0.99,
            }
        }
    }
}

/// Mix `input * gain` into `output`, moving `current` toward `target`.
///
/// `current` is updated in place so the ramp resumes seamlessly on the next
/// block. Pairs that are silent and will stay silent are skipped.
#[inline]
pub fn ramp_mix(ramp: GainRamp, current: &mut f32, target: f32, input: &[f32], output: &mut [f32]) {
    let len = input.len().min(output.len());
    if len == 0 {
        return;
    }

    match ramp {
        GainRamp::Linear => {
            if *current < SMALL_GAIN && target < SMALL_GAIN {
                return;
            }
            let slope = (target - *current) / len as f32;
            let mut gain = *current;
            for (out, &inp) in output[..len].iter_mut().zip(&input[..len]) {
                gain += slope;
                *out += inp * gain;
            }
            // Drop the accumulated rounding so the next block starts on target.
            *current = target;
        }
        GainRamp::Exponential { factor } => {
            let mut gain = *current;
            for (out, &inp) in output[..len].iter_mut().zip(&input[..len]) {
                gain = target + (gain - target) * factor;
                if gain < SMALL_GAIN && target < SMALL_GAIN {
                    break;
                }
                *out += inp * gain;
            }
            *current = gain;
        }
    }
}
