//! Engine construction and the control-thread handle
//!
//! [`SpatEngine::split`] hands out the two halves of the engine:
//! - [`SpatController`]: owned by the control thread. Rebuilds topologies,
//!   swaps configurations under the reconfiguration lock, publishes source
//!   gains and polls meters through exchange slots.
//! - [`AudioRenderer`]: owned by the audio callback.

use crate::config::AudioConfig;
use crate::error::{EngineError, EngineResult};
use crate::exchange::{ExchangeReader, ExchangeWriter, exchange_slot};
use crate::processor::{AudioRenderer, EngineStats, RenderCore, StatsSnapshot};
use crate::state::{AudioState, SpatGains};
use orbit_core::{MAX_BLOCK_SIZE, OrbitError, Position, ProjectData, SpatMode, SpeakerSetup};
use orbit_spatial::{HrtfBank, SpatAlgorithm};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════

/// Device-level settings, fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub sample_rate: u32,
    /// Largest block the renderer accepts; scratch buffers are sized to it
    pub max_block_size: usize,
    /// Directory holding the HRTF impulse responses. Without it the engine
    /// runs every mode except binaural.
    pub hrtf_dir: Option<PathBuf>,
    /// Fixed seed for the pink noise generator, random when `None`
    pub noise_seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            max_block_size: MAX_BLOCK_SIZE,
            hrtf_dir: None,
            noise_seed: None,
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> EngineResult<()> {
        if self.sample_rate == 0 {
            return Err(OrbitError::InvalidSampleRate(self.sample_rate).into());
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE {
            return Err(OrbitError::InvalidParam(format!(
                "max block size {} outside 1..={MAX_BLOCK_SIZE}",
                self.max_block_size
            ))
            .into());
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════

/// A fully initialised renderer, ready to be split between threads
pub struct SpatEngine {
    controller: SpatController,
    renderer: AudioRenderer,
}

impl SpatEngine {
    /// Build an engine, loading HRTF data from `settings.hrtf_dir` if set.
    ///
    /// A missing or unreadable HRTF set is fatal.
    pub fn new(settings: EngineSettings, setup: SpeakerSetup, project: ProjectData) -> EngineResult<Self> {
        settings.validate()?;
        let hrtf = match &settings.hrtf_dir {
            Some(dir) => Some(HrtfBank::load_from_dir(dir)?),
            None => None,
        };
        Self::with_hrtf(settings, hrtf, setup, project)
    }

    /// Build an engine around an already loaded HRTF bank
    pub fn with_hrtf(
        settings: EngineSettings,
        hrtf: Option<HrtfBank>,
        setup: SpeakerSetup,
        project: ProjectData,
    ) -> EngineResult<Self> {
        settings.validate()?;
        let hrtf = hrtf.map(Arc::new);

        let algorithm = SpatAlgorithm::build(&setup)?;
        if algorithm.mode() == SpatMode::Binaural && hrtf.is_none() {
            return Err(EngineError::HrtfUnavailable);
        }
        let config = AudioConfig::from_session(&setup, &project, settings.sample_rate)?;

        let num_sources = project.sources.len();
        let num_speakers = setup.speakers.len();
        let channels = algorithm.num_gain_channels();

        let mut last_sets = vec![None; num_sources];
        let (gain_outputs, gain_inputs) = gain_slots(&algorithm, &project, &mut last_sets);
        let (source_peak_writer, source_peaks) = exchange_slot(vec![0.0; num_sources]);
        let (speaker_peak_writer, speaker_peaks) = exchange_slot(vec![0.0; num_speakers]);

        let core = RenderCore {
            config,
            state: AudioState::new(
                num_sources,
                num_speakers,
                channels,
                settings.max_block_size,
                settings.noise_seed,
            ),
            gain_inputs,
            source_peaks: source_peak_writer,
            speaker_peaks: speaker_peak_writer,
            hrtf: hrtf.clone(),
            max_block: settings.max_block_size,
        };
        let core = Arc::new(Mutex::new(core));
        let stats = Arc::new(EngineStats::default());

        log::info!(
            "Spatial engine ready: {} mode, {} sources, {} speakers, {} Hz",
            algorithm.mode(),
            num_sources,
            num_speakers,
            settings.sample_rate
        );

        Ok(Self {
            controller: SpatController {
                core: Arc::clone(&core),
                stats: Arc::clone(&stats),
                settings,
                hrtf,
                setup,
                project,
                algorithm,
                gain_outputs,
                last_sets,
                source_peaks,
                speaker_peaks,
            },
            renderer: AudioRenderer { core, stats },
        })
    }

    /// Separate the control half from the audio half
    pub fn split(self) -> (SpatController, AudioRenderer) {
        (self.controller, self.renderer)
    }
}

/// Create one gain slot per source, primed with the gains for its current
/// position
fn gain_slots(
    algorithm: &SpatAlgorithm,
    project: &ProjectData,
    last_sets: &mut [Option<usize>],
) -> (Vec<ExchangeWriter<SpatGains>>, Vec<ExchangeReader<SpatGains>>) {
    let channels = algorithm.num_gain_channels();
    project
        .sources
        .iter()
        .zip(last_sets.iter_mut())
        .map(|(source, last_set)| {
            let mut gains = SpatGains::silent(channels);
            if let Some(position) = &source.position {
                algorithm.compute_gains(position, last_set, &mut gains.gains);
            }
            gains.set_distance(source.position.as_ref());
            exchange_slot(gains)
        })
        .unzip()
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════

/// Control-thread handle.
///
/// Every method that changes the render configuration blocks until the
/// reconfiguration lock is free; the audio thread skips blocks meanwhile.
pub struct SpatController {
    core: Arc<Mutex<RenderCore>>,
    stats: Arc<EngineStats>,
    settings: EngineSettings,
    hrtf: Option<Arc<HrtfBank>>,
    setup: SpeakerSetup,
    project: ProjectData,
    algorithm: SpatAlgorithm,
    gain_outputs: Vec<ExchangeWriter<SpatGains>>,
    /// VBAP set last used by each source
    last_sets: Vec<Option<usize>>,
    source_peaks: ExchangeReader<Vec<f32>>,
    speaker_peaks: ExchangeReader<Vec<f32>>,
}

impl SpatController {
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn setup(&self) -> &SpeakerSetup {
        &self.setup
    }

    pub fn project(&self) -> &ProjectData {
        &self.project
    }

    /// Active topology
    pub fn algorithm(&self) -> &SpatAlgorithm {
        &self.algorithm
    }

    pub fn mode(&self) -> SpatMode {
        self.algorithm.mode()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Swap in new project settings.
    ///
    /// Source positions in `project` are republished. Render state is only
    /// reset when the number of sources changes.
    pub fn set_config(&mut self, project: ProjectData) -> EngineResult<()> {
        let config = AudioConfig::from_session(&self.setup, &project, self.settings.sample_rate)?;
        let num_sources = project.sources.len();

        if num_sources != self.project.sources.len() {
            let mut last_sets = vec![None; num_sources];
            let (gain_outputs, gain_inputs) = gain_slots(&self.algorithm, &project, &mut last_sets);
            let (source_peak_writer, source_peaks) = exchange_slot(vec![0.0; num_sources]);
            {
                let mut core = self.core.lock();
                let num_speakers = config.num_speakers();
                let channels = self.algorithm.num_gain_channels();
                core.config = config;
                core.gain_inputs = gain_inputs;
                core.source_peaks = source_peak_writer;
                core.state.reset(num_sources, num_speakers, channels);
            }
            self.gain_outputs = gain_outputs;
            self.last_sets = last_sets;
            self.source_peaks = source_peaks;
            self.project = project;
        } else {
            self.core.lock().config = config;
            self.project = project;
            for index in 0..num_sources {
                self.publish_gains(index);
            }
        }

        log::debug!(
            "Config swapped: {} sources, {} speakers, {} mode",
            num_sources,
            self.setup.speakers.len(),
            self.setup.spat_mode
        );
        Ok(())
    }

    /// Rebuild the topology for a new speaker setup.
    ///
    /// On error the previous topology stays active and nothing is swapped.
    pub fn set_topology(&mut self, setup: SpeakerSetup) -> EngineResult<()> {
        let result = self.build_topology(&setup);
        let (algorithm, config) = match result {
            Ok(built) => built,
            Err(e) => {
                log::warn!("Speaker setup rejected, keeping previous topology: {e}");
                return Err(e);
            }
        };

        let num_sources = self.project.sources.len();
        let num_speakers = setup.speakers.len();
        let channels = algorithm.num_gain_channels();

        let mut last_sets = vec![None; num_sources];
        let (gain_outputs, gain_inputs) = gain_slots(&algorithm, &self.project, &mut last_sets);
        let (speaker_peak_writer, speaker_peaks) = exchange_slot(vec![0.0; num_speakers]);

        {
            let mut core = self.core.lock();
            core.config = config;
            core.gain_inputs = gain_inputs;
            core.speaker_peaks = speaker_peak_writer;
            core.state.reset(num_sources, num_speakers, channels);
        }

        log::info!(
            "Topology rebuilt: {} mode, {} speakers, {} panning sets",
            algorithm.mode(),
            num_speakers,
            algorithm.triplets().len()
        );

        self.algorithm = algorithm;
        self.setup = setup;
        self.gain_outputs = gain_outputs;
        self.last_sets = last_sets;
        self.speaker_peaks = speaker_peaks;
        Ok(())
    }

    fn build_topology(&self, setup: &SpeakerSetup) -> EngineResult<(SpatAlgorithm, AudioConfig)> {
        let algorithm = SpatAlgorithm::build(setup)?;
        if algorithm.mode() == SpatMode::Binaural && self.hrtf.is_none() {
            return Err(EngineError::HrtfUnavailable);
        }
        let config = AudioConfig::from_session(setup, &self.project, self.settings.sample_rate)?;
        Ok((algorithm, config))
    }

    /// Zero the HRTF convolution history
    pub fn reset_hrtf(&mut self) {
        self.core.lock().state.binaural.reset();
    }

    /// Move one source. Lock-free: only the source's gain slot is written.
    pub fn set_source_position(&mut self, index: usize, position: Position) -> EngineResult<()> {
        let count = self.project.sources.len();
        let Some(source) = self.project.sources.get_mut(index) else {
            return Err(OrbitError::SourceOutOfRange { index, count }.into());
        };
        source.position = Some(position);
        self.publish_gains(index);
        Ok(())
    }

    fn publish_gains(&mut self, index: usize) {
        let position = self.project.sources[index].position.as_ref();
        let writer = &mut self.gain_outputs[index];
        let slot = writer.acquire();
        match position {
            Some(position) => {
                self.algorithm
                    .compute_gains(position, &mut self.last_sets[index], &mut slot.gains);
            }
            None => slot.gains.fill(0.0),
        }
        slot.set_distance(position);
        writer.publish();
    }

    /// Most recent input peaks, one per source
    pub fn source_peaks(&mut self) -> &[f32] {
        self.source_peaks.fetch_latest()
    }

    /// Most recent output peaks, one per speaker
    pub fn speaker_peaks(&mut self) -> &[f32] {
        self.speaker_peaks.fetch_latest()
    }
}
