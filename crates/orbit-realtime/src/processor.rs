//! Per-block render pipeline
//!
//! Runs on the audio thread. The only synchronization is a try-lock on the
//! reconfiguration mutex; when the control thread holds it the whole block
//! is skipped and no buffer is touched.
//!
//! Block order:
//! 1. source peaks, muted sources zeroed
//! 2. pink noise, or the active panning algorithm
//! 3. direct outs
//! 4. speaker mute, gain, crossover and peaks
//! 5. peaks published to the control thread

use crate::config::AudioConfig;
use crate::exchange::{ExchangeReader, ExchangeWriter};
use crate::state::{AudioState, SpatGains};
use orbit_core::{OrbitError, OrbitResult, SMALL_GAIN, SpatMode};
use orbit_dsp::{GainRamp, peak, ramp_mix};
use orbit_spatial::HrtfBank;
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What happened to a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Rendered,
    /// The control thread was reconfiguring; buffers are untouched
    Skipped,
}

/// Block counters shared with the control side
#[derive(Debug, Default)]
pub struct EngineStats {
    rendered: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub rendered_blocks: u64,
    pub skipped_blocks: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rendered_blocks: self.rendered.load(Ordering::Relaxed),
            skipped_blocks: self.skipped.load(Ordering::Relaxed),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RENDER CORE
// ═══════════════════════════════════════════════════════════════════════════

/// Everything guarded by the reconfiguration lock
pub(crate) struct RenderCore {
    pub(crate) config: AudioConfig,
    pub(crate) state: AudioState,
    pub(crate) gain_inputs: Vec<ExchangeReader<SpatGains>>,
    pub(crate) source_peaks: ExchangeWriter<Vec<f32>>,
    pub(crate) speaker_peaks: ExchangeWriter<Vec<f32>>,
    /// Absent when the engine was started without HRTF data
    pub(crate) hrtf: Option<Arc<HrtfBank>>,
    pub(crate) max_block: usize,
}

impl RenderCore {
    fn check_shape(&self, sources: &[&mut [f32]], speakers: &[&mut [f32]]) -> OrbitResult<usize> {
        if sources.len() != self.config.num_sources() {
            return Err(OrbitError::ChannelMismatch {
                kind: "source",
                expected: self.config.num_sources(),
                got: sources.len(),
            });
        }
        if speakers.len() != self.config.num_speakers() {
            return Err(OrbitError::ChannelMismatch {
                kind: "speaker",
                expected: self.config.num_speakers(),
                got: speakers.len(),
            });
        }

        let len = speakers
            .first()
            .or(sources.first())
            .map_or(0, |b| b.len());
        if len > self.max_block {
            return Err(OrbitError::BlockTooLarge {
                got: len,
                max: self.max_block,
            });
        }
        for buffer in sources.iter().chain(speakers.iter()) {
            if buffer.len() != len {
                return Err(OrbitError::BlockLengthMismatch {
                    expected: len,
                    got: buffer.len(),
                });
            }
        }
        Ok(len)
    }

    fn process(&mut self, sources: &mut [&mut [f32]], speakers: &mut [&mut [f32]]) -> OrbitResult<()> {
        let len = self.check_shape(sources, speakers)?;

        let Self {
            config,
            state,
            gain_inputs,
            source_peaks,
            speaker_peaks,
            hrtf,
            ..
        } = self;
        let config: &AudioConfig = config;
        let hrtf = hrtf.as_deref();

        let source_peaks_slot = source_peaks.acquire();
        meter_sources(config, sources, source_peaks_slot);

        for speaker in speakers.iter_mut() {
            speaker.fill(0.0);
        }

        if let Some(gain) = config.pink_noise_gain {
            let noise = &mut state.scratch.noise[..len];
            state.pink_noise.fill(noise, gain);
            for speaker in speakers.iter_mut() {
                speaker.copy_from_slice(noise);
            }
        } else {
            match config.spat_mode {
                SpatMode::Vbap | SpatMode::Lbap => {
                    let apply_attenuation = config.spat_mode == SpatMode::Lbap;
                    let feeds = Feeds {
                        config,
                        peaks: source_peaks_slot,
                        apply_attenuation,
                    };
                    feeds.mix(state, gain_inputs, sources, speakers, |c| {
                        let s = &config.speakers[c];
                        !(s.muted || s.direct_out_only || s.gain < SMALL_GAIN)
                    });
                }
                SpatMode::Binaural => {
                    // The controller refuses binaural mode without a bank.
                    if let Some(bank) = hrtf {
                        render_binaural(config, state, gain_inputs, source_peaks_slot, bank, sources, speakers, len);
                    }
                }
                SpatMode::Stereo => {
                    render_stereo(config, state, gain_inputs, source_peaks_slot, sources, speakers, len);
                }
            }

            for &(source, speaker) in &config.direct_out_pairs {
                for (out, &inp) in speakers[speaker].iter_mut().zip(sources[source].iter()) {
                    *out += inp;
                }
            }
        }

        let speaker_peaks_slot = speaker_peaks.acquire();
        finish_speakers(config, state, speakers, speaker_peaks_slot);

        source_peaks.publish();
        speaker_peaks.publish();
        Ok(())
    }
}

/// Input peaks; muted sources are zeroed and report 0
fn meter_sources(config: &AudioConfig, sources: &mut [&mut [f32]], peaks: &mut Vec<f32>) {
    peaks.resize(sources.len(), 0.0);
    for ((buffer, cfg), p) in sources.iter_mut().zip(&config.sources).zip(peaks.iter_mut()) {
        if cfg.muted {
            buffer.fill(0.0);
            *p = 0.0;
        } else {
            *p = peak(buffer);
        }
    }
}

/// Speaker mute, gain, crossover and output peaks
fn finish_speakers(
    config: &AudioConfig,
    state: &mut AudioState,
    speakers: &mut [&mut [f32]],
    peaks: &mut Vec<f32>,
) {
    peaks.resize(speakers.len(), 0.0);
    for (index, buffer) in speakers.iter_mut().enumerate() {
        let cfg = &config.speakers[index];
        let gain = config.master_gain * cfg.gain;
        if cfg.muted || gain < SMALL_GAIN {
            buffer.fill(0.0);
            peaks[index] = 0.0;
            continue;
        }

        if gain != 1.0 {
            for sample in buffer.iter_mut() {
                *sample *= gain;
            }
        }
        if let Some(coeffs) = &cfg.highpass {
            state.highpass[index].process(coeffs, buffer);
        }
        peaks[index] = peak(buffer);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SOURCE MIXING
// ═══════════════════════════════════════════════════════════════════════════

/// Shared inputs of one panning pass
struct Feeds<'a> {
    config: &'a AudioConfig,
    peaks: &'a [f32],
    apply_attenuation: bool,
}

impl Feeds<'_> {
    /// Pan every eligible source into `outputs` with smoothed gains.
    ///
    /// `channel_active` gates output channels; gated channels keep their
    /// smoothed gains untouched.
    fn mix<O: AsMut<[f32]>>(
        &self,
        state: &mut AudioState,
        gain_inputs: &mut [ExchangeReader<SpatGains>],
        sources: &mut [&mut [f32]],
        outputs: &mut [O],
        channel_active: impl Fn(usize) -> bool,
    ) {
        let ramp: GainRamp = self.config.gain_ramp;

        for (index, input) in sources.iter_mut().enumerate() {
            let cfg = &self.config.sources[index];
            if cfg.muted || cfg.direct_out.is_some() || self.peaks[index] < SMALL_GAIN {
                continue;
            }
            let target = gain_inputs[index].fetch_latest();
            let source_state = &mut state.sources[index];

            if self.apply_attenuation {
                self.config
                    .lbap_attenuation
                    .process(input, target.distance, &mut source_state.attenuation);
            }

            for (channel, output) in outputs.iter_mut().enumerate() {
                if !channel_active(channel) {
                    continue;
                }
                let (Some(current), Some(&goal)) = (
                    source_state.last_gains.get_mut(channel),
                    target.gains.get(channel),
                ) else {
                    continue;
                };
                ramp_mix(ramp, current, goal, input, output.as_mut());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_binaural(
    config: &AudioConfig,
    state: &mut AudioState,
    gain_inputs: &mut [ExchangeReader<SpatGains>],
    peaks: &[f32],
    hrtf: &HrtfBank,
    sources: &mut [&mut [f32]],
    speakers: &mut [&mut [f32]],
    len: usize,
) {
    let mut virtual_channels = std::mem::take(&mut state.scratch.virtual_channels);
    for channel in virtual_channels.iter_mut() {
        channel[..len].fill(0.0);
    }

    let feeds = Feeds {
        config,
        peaks,
        apply_attenuation: false,
    };
    {
        let mut views: [&mut [f32]; orbit_core::BINAURAL_VIRTUAL_SPEAKERS] =
            std::array::from_fn(|_| <&mut [f32]>::default());
        for (view, channel) in views.iter_mut().zip(virtual_channels.iter_mut()) {
            *view = &mut channel[..len];
        }
        feeds.mix(state, gain_inputs, sources, &mut views, |_| true);
    }

    let (left, right) = state.scratch.stereo_mut(len);
    left.fill(0.0);
    right.fill(0.0);
    for (channel, feed) in virtual_channels.iter().enumerate() {
        state
            .binaural
            .process_channel(hrtf, channel, &feed[..len], left, right);
    }
    state.scratch.virtual_channels = virtual_channels;

    write_stereo_pair(config, &state.scratch.left[..len], &state.scratch.right[..len], speakers, 1.0);
}

fn render_stereo(
    config: &AudioConfig,
    state: &mut AudioState,
    gain_inputs: &mut [ExchangeReader<SpatGains>],
    peaks: &[f32],
    sources: &mut [&mut [f32]],
    speakers: &mut [&mut [f32]],
    len: usize,
) {
    let mut left = std::mem::take(&mut state.scratch.left);
    let mut right = std::mem::take(&mut state.scratch.right);
    left[..len].fill(0.0);
    right[..len].fill(0.0);

    let feeds = Feeds {
        config,
        peaks,
        apply_attenuation: false,
    };
    {
        let mut pair = [&mut left[..len], &mut right[..len]];
        feeds.mix(state, gain_inputs, sources, &mut pair, |_| true);
    }

    write_stereo_pair(config, &left[..len], &right[..len], speakers, config.stereo_compensation);
    state.scratch.left = left;
    state.scratch.right = right;
}

/// Copy a rendered pair to the routed outputs and clear every other output
fn write_stereo_pair(config: &AudioConfig, left: &[f32], right: &[f32], speakers: &mut [&mut [f32]], gain: f32) {
    let routing = config.stereo_routing;
    for (index, speaker) in speakers.iter_mut().enumerate() {
        let source = if index == routing.left {
            left
        } else if index == routing.right {
            right
        } else {
            speaker.fill(0.0);
            continue;
        };
        for (out, &s) in speaker.iter_mut().zip(source) {
            *out = s * gain;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AUDIO THREAD HANDLE
// ═══════════════════════════════════════════════════════════════════════════

/// Audio-thread handle. Call [`AudioRenderer::process_block`] from the
/// device callback only.
pub struct AudioRenderer {
    pub(crate) core: Arc<Mutex<RenderCore>>,
    pub(crate) stats: Arc<EngineStats>,
}

impl AudioRenderer {
    /// Render one block.
    ///
    /// `sources` holds one input buffer per source and may be modified in
    /// place (muting, distance attenuation). `speakers` receives one output
    /// buffer per speaker. All buffers must have the same length.
    pub fn process_block(
        &mut self,
        sources: &mut [&mut [f32]],
        speakers: &mut [&mut [f32]],
    ) -> OrbitResult<BlockOutcome> {
        let Some(mut core) = self.core.try_lock() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(BlockOutcome::Skipped);
        };
        core.process(sources, speakers)?;
        self.stats.rendered.fetch_add(1, Ordering::Relaxed);
        Ok(BlockOutcome::Rendered)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
