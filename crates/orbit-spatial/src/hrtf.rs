//! Binaural rendering through a virtual speaker dome
//!
//! Sources are VBAP-panned onto 16 virtual speakers; each virtual channel
//! is then convolved with the left and right ear impulse responses measured
//! from its direction and summed into a stereo pair.

use crate::{SpatialError, SpatialResult};
use orbit_core::{BINAURAL_VIRTUAL_SPEAKERS, HRTF_TAPS, Position};
use std::path::{Path, PathBuf};

/// Virtual speaker directions as (azimuth, elevation) in degrees
pub const VIRTUAL_SPEAKERS: [(i32, i32); BINAURAL_VIRTUAL_SPEAKERS] = [
    (-155, 0),
    (-110, 0),
    (-65, 0),
    (-20, 0),
    (20, 0),
    (65, 0),
    (110, 0),
    (155, 0),
    (-148, 40),
    (-90, 40),
    (-32, 40),
    (32, 40),
    (90, 40),
    (148, 40),
    (-90, 80),
    (90, 80),
];

/// One impulse response per ear
pub type Impulse = [f32; HRTF_TAPS];

/// Virtual speaker positions on the unit sphere
pub fn virtual_positions() -> Vec<(usize, Position)> {
    VIRTUAL_SPEAKERS
        .iter()
        .enumerate()
        .map(|(i, &(az, el))| (i, Position::from_polar(az as f32, el as f32, 1.0)))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// IMPULSE RESPONSE BANK
// ═══════════════════════════════════════════════════════════════════════════

/// Immutable set of left/right impulse responses, one pair per virtual speaker
#[derive(Debug, Clone, PartialEq)]
pub struct HrtfBank {
    left: Vec<Impulse>,
    right: Vec<Impulse>,
}

impl HrtfBank {
    pub fn from_impulses(left: Vec<Impulse>, right: Vec<Impulse>) -> SpatialResult<Self> {
        if left.len() != BINAURAL_VIRTUAL_SPEAKERS || right.len() != BINAURAL_VIRTUAL_SPEAKERS {
            return Err(SpatialError::HrtfInvalid(format!(
                "expected {} impulse pairs, got {} left and {} right",
                BINAURAL_VIRTUAL_SPEAKERS,
                left.len(),
                right.len()
            )));
        }
        Ok(Self { left, right })
    }

    /// Load the bank from a directory laid out as `elev{E}/H{E}e{AAA}a.wav`.
    ///
    /// Only right-hemisphere measurements are read; left-hemisphere
    /// directions use the mirrored file with its ears swapped.
    pub fn load_from_dir(dir: &Path) -> SpatialResult<Self> {
        let mut left = Vec::with_capacity(BINAURAL_VIRTUAL_SPEAKERS);
        let mut right = Vec::with_capacity(BINAURAL_VIRTUAL_SPEAKERS);

        for &(azimuth, elevation) in &VIRTUAL_SPEAKERS {
            let path = dir.join(file_name(azimuth, elevation));
            let (near, far) = read_stereo_impulse(&path)?;
            if azimuth < 0 {
                left.push(far);
                right.push(near);
            } else {
                left.push(near);
                right.push(far);
            }
        }

        log::info!(
            "Loaded {} HRTF impulse pairs from {}",
            left.len(),
            dir.display()
        );
        Self::from_impulses(left, right)
    }

    #[inline]
    pub fn left(&self, channel: usize) -> &Impulse {
        &self.left[channel]
    }

    #[inline]
    pub fn right(&self, channel: usize) -> &Impulse {
        &self.right[channel]
    }
}

/// Relative path of the measurement for a direction
pub fn file_name(azimuth: i32, elevation: i32) -> PathBuf {
    PathBuf::from(format!("elev{elevation}")).join(format!("H{elevation}e{:03}a.wav", azimuth.abs()))
}

/// First `HRTF_TAPS` frames of channels 0 and 1, zero padded
fn read_stereo_impulse(path: &Path) -> SpatialResult<(Impulse, Impulse)> {
    if !path.is_file() {
        return Err(SpatialError::HrtfMissing(path.to_path_buf()));
    }

    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels < 2 {
        return Err(SpatialError::HrtfInvalid(format!(
            "{} has {} channel(s), need 2",
            path.display(),
            channels
        )));
    }

    let wanted = HRTF_TAPS * channels;
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .take(wanted)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.samples::<f32>().take(wanted).collect::<Result<_, _>>()?,
    };

    let mut ch0 = [0.0; HRTF_TAPS];
    let mut ch1 = [0.0; HRTF_TAPS];
    for (frame, chunk) in samples.chunks_exact(channels).enumerate() {
        ch0[frame] = chunk[0];
        ch1[frame] = chunk[1];
    }
    Ok((ch0, ch1))
}

// ═══════════════════════════════════════════════════════════════════════════
// CONVOLUTION STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Ring histories of the virtual channels
#[derive(Debug, Clone)]
pub struct BinauralState {
    history: Vec<Impulse>,
    /// Ring index of the newest sample, per channel
    newest: [usize; BINAURAL_VIRTUAL_SPEAKERS],
    /// Consecutive zero inputs, per channel
    silent_run: [usize; BINAURAL_VIRTUAL_SPEAKERS],
}

impl Default for BinauralState {
    fn default() -> Self {
        Self::new()
    }
}

impl BinauralState {
    pub fn new() -> Self {
        Self {
            history: vec![[0.0; HRTF_TAPS]; BINAURAL_VIRTUAL_SPEAKERS],
            newest: [0; BINAURAL_VIRTUAL_SPEAKERS],
            // A fresh ring holds nothing but zeros.
            silent_run: [HRTF_TAPS; BINAURAL_VIRTUAL_SPEAKERS],
        }
    }

    /// Zero every history and tap counter
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Convolve one virtual channel and accumulate into `left` / `right`
    pub fn process_channel(
        &mut self,
        bank: &HrtfBank,
        channel: usize,
        input: &[f32],
        left: &mut [f32],
        right: &mut [f32],
    ) {
        if self.silent_run[channel] >= HRTF_TAPS && input.iter().all(|&s| s == 0.0) {
            return;
        }

        let history = &mut self.history[channel];
        let left_ir = bank.left(channel);
        let right_ir = bank.right(channel);
        let mut newest = self.newest[channel];
        let mut silent_run = self.silent_run[channel];

        for ((&x, l), r) in input.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
            newest = (newest + 1) % HRTF_TAPS;
            history[newest] = x;
            silent_run = if x == 0.0 { silent_run + 1 } else { 0 };

            // Tap t reads history[newest - t]; walk the ring in two runs.
            let mut acc_l = 0.0;
            let mut acc_r = 0.0;
            let (recent, older) = history.split_at(newest + 1);
            for ((&h, &il), &ir) in recent.iter().rev().zip(left_ir).zip(right_ir) {
                acc_l += h * il;
                acc_r += h * ir;
            }
            let offset = newest + 1;
            for ((&h, &il), &ir) in older.iter().rev().zip(&left_ir[offset..]).zip(&right_ir[offset..]) {
                acc_l += h * il;
                acc_r += h * ir;
            }
            *l += acc_l;
            *r += acc_r;
        }

        self.newest[channel] = newest;
        self.silent_run[channel] = silent_run.min(HRTF_TAPS);
    }
}
