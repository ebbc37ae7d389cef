//! 4th-order Linkwitz-Riley highpass
//!
//! Used as the per-speaker crossover. Coefficients come from the bilinear
//! transform of the LR4 prototype and the filter runs in f64 so low cutoffs
//! stay stable at high sample rates.

use std::f64::consts::{PI, SQRT_2};

/// Precomputed highpass coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HighpassCoeffs {
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
    pub b4: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl HighpassCoeffs {
    /// LR4 highpass at `freq` Hz
    pub fn linkwitz_riley(freq: f64, sample_rate: f64) -> Self {
        let wc = 2.0 * PI * freq;
        let wc2 = wc * wc;
        let wc3 = wc2 * wc;
        let wc4 = wc2 * wc2;
        let k = wc / (PI * freq / sample_rate).tan();
        let k2 = k * k;
        let k3 = k2 * k;
        let k4 = k2 * k2;
        let sq_tmp1 = SQRT_2 * wc3 * k;
        let sq_tmp2 = SQRT_2 * wc * k3;
        let a_tmp = 4.0 * wc2 * k2 + 2.0 * sq_tmp1 + k4 + 2.0 * sq_tmp2 + wc4;

        let a0 = k4 / a_tmp;
        Self {
            b1: (4.0 * (wc4 + sq_tmp1 - k4 - sq_tmp2)) / a_tmp,
            b2: (6.0 * wc4 - 8.0 * wc2 * k2 + 6.0 * k4) / a_tmp,
            b3: (4.0 * (wc4 - sq_tmp1 + sq_tmp2 - k4)) / a_tmp,
            b4: (k4 - 2.0 * sq_tmp1 + wc4 - 2.0 * sq_tmp2 + 4.0 * wc2 * k2) / a_tmp,
            a0,
            a1: -4.0 * a0,
            a2: 6.0 * a0,
        }
    }
}

/// Filter history, one per speaker
#[derive(Debug, Clone, Copy, Default)]
pub struct HighpassState {
    x1: f64,
    x2: f64,
    x3: f64,
    x4: f64,
    y1: f64,
    y2: f64,
    y3: f64,
    y4: f64,
}

impl HighpassState {
    #[inline]
    pub fn process_sample(&mut self, c: &HighpassCoeffs, input: f32) -> f32 {
        let x = f64::from(input);
        let y = c.a0 * x + c.a1 * self.x1 + c.a2 * self.x2 + c.a1 * self.x3 + c.a0 * self.x4
            - c.b1 * self.y1
            - c.b2 * self.y2
            - c.b3 * self.y3
            - c.b4 * self.y4;

        self.x4 = self.x3;
        self.x3 = self.x2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y4 = self.y3;
        self.y3 = self.y2;
        self.y2 = self.y1;
        self.y1 = y;

        y as f32
    }

    /// Filter a buffer in place
    pub fn process(&mut self, coeffs: &HighpassCoeffs, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(coeffs, *sample);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(freq: f64, signal: impl Fn(usize) -> f32, len: usize) -> Vec<f32> {
        let coeffs = HighpassCoeffs::linkwitz_riley(freq, 48_000.0);
        let mut state = HighpassState::default();
        let mut buffer: Vec<f32> = (0..len).map(signal).collect();
        state.process(&coeffs, &mut buffer);
        buffer
    }

    #[test]
    fn test_blocks_dc() {
        let out = run(80.0, |_| 1.0, 9600);
        assert!(out[9599].abs() < 1e-3, "dc leaked: {}", out[9599]);
    }

    #[test]
    fn test_passes_nyquist() {
        let out = run(80.0, |i| if i % 2 == 0 { 1.0 } else { -1.0 }, 4800);
        let tail = out[4700..].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!((tail - 1.0).abs() < 1e-2, "nyquist gain {tail}");
    }

    #[test]
    fn test_attenuates_below_cutoff() {
        let freq = 500.0;
        let sine = |i: usize| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 48_000.0).sin();
        let out = run(freq, sine, 48_000);
        let tail = out[24_000..].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(tail < 0.01, "100 Hz through a 500 Hz LR4: {tail}");
    }

    #[test]
    fn test_reset_clears_history() {
        let coeffs = HighpassCoeffs::linkwitz_riley(120.0, 44_100.0);
        let mut state = HighpassState::default();
        state.process_sample(&coeffs, 1.0);
        state.reset();
        assert_eq!(state.process_sample(&coeffs, 0.0), 0.0);
    }
}
