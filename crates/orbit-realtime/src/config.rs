//! Immutable audio configuration snapshot
//!
//! Built on the control thread from the editable session, then handed to
//! the render pipeline under the reconfiguration lock. Everything the
//! audio thread needs is already resolved here: decibels are linear gains,
//! solo is folded into mute, filter coefficients are computed.

use orbit_core::{
    OrbitError, OrbitResult, PortState, ProjectData, SpatMode, SpeakerSetup, StereoRouting,
    db_to_gain,
};
use orbit_dsp::{AttenuationConfig, GainRamp, HighpassCoeffs};
use orbit_spatial::stereo_compensation;

/// Per-source settings
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAudioConfig {
    /// Muted directly or silenced by another source's solo
    pub muted: bool,
    /// Speaker buffer that receives this source unpanned
    pub direct_out: Option<usize>,
}

/// Per-speaker settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerAudioConfig {
    /// Muted directly or silenced by another speaker's solo
    pub muted: bool,
    /// Linear trim
    pub gain: f32,
    pub highpass: Option<HighpassCoeffs>,
    pub direct_out_only: bool,
}

/// Everything the render pipeline reads during a block
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub spat_mode: SpatMode,
    pub sources: Vec<SourceAudioConfig>,
    pub speakers: Vec<SpeakerAudioConfig>,
    /// Linear master gain
    pub master_gain: f32,
    pub gain_ramp: GainRamp,
    /// Linear pink noise level, `None` when the generator is off
    pub pink_noise_gain: Option<f32>,
    pub lbap_attenuation: AttenuationConfig,
    pub stereo_routing: StereoRouting,
    /// Loudness compensation applied in stereo mode
    pub stereo_compensation: f32,
    /// `(source, speaker)` pairs summed without panning
    pub direct_out_pairs: Vec<(usize, usize)>,
}

impl AudioConfig {
    /// Resolve a session into a render snapshot
    pub fn from_session(setup: &SpeakerSetup, project: &ProjectData, sample_rate: u32) -> OrbitResult<Self> {
        if sample_rate == 0 {
            return Err(OrbitError::InvalidSampleRate(sample_rate));
        }
        let nyquist = sample_rate as f32 * 0.5;

        let speaker_solo = setup.any_solo();
        let speakers = setup
            .speakers
            .iter()
            .map(|s| {
                let highpass = match s.highpass_hz {
                    Some(freq) if freq <= 0.0 || freq >= nyquist => {
                        return Err(OrbitError::InvalidParam(format!(
                            "speaker {} highpass {freq} Hz outside (0, {nyquist})",
                            s.id
                        )));
                    }
                    Some(freq) => Some(HighpassCoeffs::linkwitz_riley(
                        f64::from(freq),
                        f64::from(sample_rate),
                    )),
                    None => None,
                };
                Ok(SpeakerAudioConfig {
                    muted: is_silenced(s.state, speaker_solo),
                    gain: db_to_gain(s.gain_db),
                    highpass,
                    direct_out_only: s.direct_out_only,
                })
            })
            .collect::<OrbitResult<Vec<_>>>()?;

        let source_solo = project.any_solo();
        let mut direct_out_pairs = Vec::new();
        let mut sources = Vec::with_capacity(project.sources.len());
        for (index, source) in project.sources.iter().enumerate() {
            let direct_out = match source.direct_out {
                Some(id) => {
                    let speaker = setup.index_of(id).ok_or_else(|| {
                        OrbitError::InvalidParam(format!(
                            "source {index} routed to unknown speaker {id}"
                        ))
                    })?;
                    direct_out_pairs.push((index, speaker));
                    Some(speaker)
                }
                None => None,
            };
            sources.push(SourceAudioConfig {
                muted: is_silenced(source.state, source_solo),
                direct_out,
            });
        }

        let routing = project.stereo_routing;
        if setup.spat_mode.is_stereo_output() {
            for channel in [routing.left, routing.right] {
                if channel >= speakers.len() {
                    return Err(OrbitError::SpeakerOutOfRange {
                        index: channel,
                        count: speakers.len(),
                    });
                }
            }
            if routing.left == routing.right {
                return Err(OrbitError::InvalidParam(
                    "stereo routing uses the same output twice".into(),
                ));
            }
        }

        let active_sources = sources
            .iter()
            .filter(|s| !s.muted && s.direct_out.is_none())
            .count();

        Ok(Self {
            spat_mode: setup.spat_mode,
            sources,
            speakers,
            master_gain: project.master_gain(),
            gain_ramp: GainRamp::from_interpolation(project.gain_interpolation),
            pink_noise_gain: project.pink_noise_db.map(db_to_gain),
            lbap_attenuation: AttenuationConfig::new(&project.lbap_attenuation, sample_rate as f32),
            stereo_routing: routing,
            stereo_compensation: stereo_compensation(active_sources),
            direct_out_pairs,
        })
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn num_speakers(&self) -> usize {
        self.speakers.len()
    }
}

#[inline]
fn is_silenced(state: PortState, any_solo: bool) -> bool {
    match state {
        PortState::Muted => true,
        PortState::Solo => false,
        PortState::Normal => any_solo,
    }
}
