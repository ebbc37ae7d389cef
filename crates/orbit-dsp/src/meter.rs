//! Block peak metering

/// Largest absolute sample value in the block
#[inline]
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |max, s| max.max(s.abs()))
}
