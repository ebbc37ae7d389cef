//! Pink noise test signal
//!
//! Paul Kellet's refined pinking filter driven by a seeded ChaCha stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Output scaling applied to the filter sum
const OUTPUT_SCALE: f32 = 0.2;

/// Pink noise generator
#[derive(Debug, Clone)]
pub struct PinkNoise {
    rng: ChaCha8Rng,
    c: [f32; 7],
}

impl PinkNoise {
    /// Create a generator, deterministic when a seed is given
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self { rng, c: [0.0; 7] }
    }

    /// Next sample at unit gain
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white: f32 = self.rng.random_range(-1.0..=1.0);
        let c = &mut self.c;
        c[0] = c[0] * 0.99886 + white * 0.055_517_9;
        c[1] = c[1] * 0.99332 + white * 0.075_075_9;
        c[2] = c[2] * 0.969 + white * 0.153_852;
        c[3] = c[3] * 0.8665 + white * 0.310_485_6;
        c[4] = c[4] * 0.55 + white * 0.532_952_2;
        c[5] = c[5] * -0.7616 - white * 0.016_898;
        let value = c[0] + c[1] + c[2] + c[3] + c[4] + c[5] + c[6] + white * 0.5362;
        c[6] = white * 0.115_926;
        value * OUTPUT_SCALE
    }

    /// Overwrite `out` with noise scaled by `gain`
    pub fn fill(&mut self, out: &mut [f32], gain: f32) {
        for sample in out.iter_mut() {
            *sample = self.next_sample() * gain;
        }
    }

    /// Clear the filter memory, keeping the random stream
    pub fn reset(&mut self) {
        self.c = [0.0; 7];
    }
}
