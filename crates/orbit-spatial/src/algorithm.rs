//! Panning algorithm selection
//!
//! One variant per spatialization mode. Each is built from a speaker setup
//! and turns a source position into a gain vector; the render path switches
//! on the variant once per block.

use crate::hrtf;
use crate::{LbapField, SpatialError, SpatialResult, SpeakerSet, StereoPanner, VbapTopology};
use orbit_core::{BINAURAL_VIRTUAL_SPEAKERS, Position, SpatMode, SpeakerData, SpeakerSetup};
use std::collections::HashSet;

/// Built topology for the active mode
#[derive(Debug, Clone)]
pub enum SpatAlgorithm {
    /// Gains indexed by speaker
    Vbap(VbapTopology),
    /// Gains indexed by speaker
    Lbap(LbapField),
    /// Gains indexed by virtual speaker
    Binaural(VbapTopology),
    /// Gains indexed by [`crate::stereo::LEFT`] / [`crate::stereo::RIGHT`]
    Stereo(StereoPanner),
}

impl SpatAlgorithm {
    /// Build the topology for `setup.spat_mode`
    pub fn build(setup: &SpeakerSetup) -> SpatialResult<Self> {
        validate_layout(&setup.speakers)?;

        let algorithm = match setup.spat_mode {
            SpatMode::Vbap => Self::Vbap(VbapTopology::build(&setup.speakers)?),
            SpatMode::Lbap => Self::Lbap(LbapField::build(&setup.speakers)?),
            SpatMode::Binaural => Self::Binaural(VbapTopology::from_positions(
                &hrtf::virtual_positions(),
                BINAURAL_VIRTUAL_SPEAKERS,
            )?),
            SpatMode::Stereo => Self::Stereo(StereoPanner::new()?),
        };
        Ok(algorithm)
    }

    pub fn mode(&self) -> SpatMode {
        match self {
            Self::Vbap(_) => SpatMode::Vbap,
            Self::Lbap(_) => SpatMode::Lbap,
            Self::Binaural(_) => SpatMode::Binaural,
            Self::Stereo(_) => SpatMode::Stereo,
        }
    }

    /// Length of the gain vectors this algorithm produces
    pub fn num_gain_channels(&self) -> usize {
        match self {
            Self::Vbap(topology) => topology.num_outputs(),
            Self::Lbap(field) => field.num_outputs(),
            Self::Binaural(_) => BINAURAL_VIRTUAL_SPEAKERS,
            Self::Stereo(_) => 2,
        }
    }

    /// Gains for one source; `last_set` is that source's VBAP history
    pub fn compute_gains(&self, position: &Position, last_set: &mut Option<usize>, gains: &mut [f32]) {
        match self {
            Self::Vbap(topology) | Self::Binaural(topology) => {
                topology.compute_gains(position, last_set, gains)
            }
            Self::Lbap(field) => field.compute_gains(position, gains),
            Self::Stereo(panner) => panner.compute_gains(position, gains),
        }
    }

    /// VBAP sets of the active topology, empty for field panning
    pub fn triplets(&self) -> &[SpeakerSet] {
        match self {
            Self::Vbap(topology) | Self::Binaural(topology) => topology.sets(),
            Self::Lbap(_) | Self::Stereo(_) => &[],
        }
    }
}

fn validate_layout(speakers: &[SpeakerData]) -> SpatialResult<()> {
    if speakers.len() < 2 {
        return Err(SpatialError::NotEnoughSpeakers {
            needed: 2,
            got: speakers.len(),
        });
    }
    let mut seen = HashSet::with_capacity(speakers.len());
    for speaker in speakers {
        if !seen.insert(speaker.id) {
            return Err(SpatialError::DuplicateSpeaker(speaker.id));
        }
    }
    Ok(())
}
