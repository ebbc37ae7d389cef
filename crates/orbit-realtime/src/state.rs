//! Mutable render state
//!
//! Owned by the render core for the whole session. Everything is sized on
//! the control thread; the audio thread only overwrites values in place.

use orbit_core::{BINAURAL_VIRTUAL_SPEAKERS, Position};
use orbit_dsp::{AttenuationState, HighpassState, PinkNoise};
use orbit_spatial::BinauralState;

/// Target gains for one source, produced by the control thread
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpatGains {
    pub gains: Vec<f32>,
    /// Source distance from the listener, used by field attenuation
    pub distance: f32,
}

impl SpatGains {
    pub fn silent(channels: usize) -> Self {
        Self {
            gains: vec![0.0; channels],
            distance: 0.0,
        }
    }

    pub(crate) fn set_distance(&mut self, position: Option<&Position>) {
        self.distance = position.map_or(0.0, Position::length);
    }
}

/// Per-source smoothing and attenuation memory
#[derive(Debug, Clone)]
pub struct SourceAudioState {
    /// Current smoothed gain per output channel
    pub last_gains: Vec<f32>,
    pub attenuation: AttenuationState,
}

impl SourceAudioState {
    fn new(channels: usize) -> Self {
        Self {
            last_gains: vec![0.0; channels],
            attenuation: AttenuationState::default(),
        }
    }
}

/// Scratch buffers for intermediate channels
#[derive(Debug, Clone)]
pub struct Scratch {
    /// Virtual speaker feeds for binaural rendering
    pub virtual_channels: Vec<Vec<f32>>,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub noise: Vec<f32>,
}

impl Scratch {
    fn new(max_block: usize) -> Self {
        Self {
            virtual_channels: vec![vec![0.0; max_block]; BINAURAL_VIRTUAL_SPEAKERS],
            left: vec![0.0; max_block],
            right: vec![0.0; max_block],
            noise: vec![0.0; max_block],
        }
    }

    /// Left/right pair as two disjoint mutable slices
    pub fn stereo_mut(&mut self, len: usize) -> (&mut [f32], &mut [f32]) {
        (&mut self.left[..len], &mut self.right[..len])
    }
}

/// All mutable state of the render pipeline
#[derive(Debug, Clone)]
pub struct AudioState {
    pub sources: Vec<SourceAudioState>,
    pub highpass: Vec<HighpassState>,
    pub binaural: BinauralState,
    pub pink_noise: PinkNoise,
    pub scratch: Scratch,
}

impl AudioState {
    pub fn new(
        num_sources: usize,
        num_speakers: usize,
        gain_channels: usize,
        max_block: usize,
        noise_seed: Option<u64>,
    ) -> Self {
        Self {
            sources: vec![SourceAudioState::new(gain_channels); num_sources],
            highpass: vec![HighpassState::default(); num_speakers],
            binaural: BinauralState::new(),
            pink_noise: PinkNoise::new(noise_seed),
            scratch: Scratch::new(max_block),
        }
    }

    /// Resize for a new topology and zero everything
    pub fn reset(&mut self, num_sources: usize, num_speakers: usize, gain_channels: usize) {
        self.sources.clear();
        self.sources
            .resize(num_sources, SourceAudioState::new(gain_channels));
        self.highpass.clear();
        self.highpass.resize(num_speakers, HighpassState::default());
        self.binaural.reset();
        self.pink_noise.reset();
    }
}
