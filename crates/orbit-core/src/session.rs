//! Control-side session model
//!
//! These are the editable structures owned by the control thread. The
//! render path never sees them directly; they are folded into an immutable
//! audio configuration snapshot first.

use crate::{Position, db_to_gain};
use serde::{Deserialize, Serialize};

/// Mute/solo state of a source or speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    #[default]
    Normal,
    Muted,
    Solo,
}

/// Spatialization algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatMode {
    /// Vector-base amplitude panning over a triangulated dome
    #[default]
    Vbap,
    /// Field-based panning inside the speaker cube
    Lbap,
    /// VBAP onto a virtual dome, then HRTF downmix to two ears
    Binaural,
    /// Two-channel pairwise panning
    Stereo,
}

impl SpatMode {
    /// Whether the mode renders to a fixed stereo pair instead of the layout
    pub fn is_stereo_output(self) -> bool {
        matches!(self, Self::Binaural | Self::Stereo)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vbap => "vbap",
            Self::Lbap => "lbap",
            Self::Binaural => "binaural",
            Self::Stereo => "stereo",
        }
    }
}

impl std::fmt::Display for SpatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One input source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceData {
    pub state: PortState,
    /// `None` until the source has been placed
    pub position: Option<Position>,
    /// Speaker id that receives this source unprocessed
    pub direct_out: Option<u32>,
}

impl Default for SourceData {
    fn default() -> Self {
        Self {
            state: PortState::Normal,
            position: Some(Position::default()),
            direct_out: None,
        }
    }
}

/// One output speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerData {
    /// User-facing identifier, unique within a setup
    pub id: u32,
    #[serde(default)]
    pub state: PortState,
    pub position: Position,
    /// Trim in decibels
    #[serde(default)]
    pub gain_db: f32,
    /// Crossover highpass cutoff
    #[serde(default)]
    pub highpass_hz: Option<f32>,
    /// Only reachable through direct outs, never panned to
    #[serde(default)]
    pub direct_out_only: bool,
}

impl SpeakerData {
    pub fn new(id: u32, position: Position) -> Self {
        Self {
            id,
            state: PortState::Normal,
            position,
            gain_db: 0.0,
            highpass_hz: None,
            direct_out_only: false,
        }
    }

    /// Speaker placed on the unit sphere, angles in degrees
    pub fn at(id: u32, azimuth: f32, elevation: f32) -> Self {
        Self::new(id, Position::from_polar(azimuth, elevation, 1.0))
    }
}

/// Ordered speaker layout. Buffer `i` of the render call feeds speaker `i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeakerSetup {
    pub speakers: Vec<SpeakerData>,
    #[serde(default)]
    pub spat_mode: SpatMode,
}

impl SpeakerSetup {
    pub fn new(speakers: Vec<SpeakerData>, spat_mode: SpatMode) -> Self {
        Self {
            speakers,
            spat_mode,
        }
    }

    /// Buffer index of the speaker with the given id
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.speakers.iter().position(|s| s.id == id)
    }

    pub fn any_solo(&self) -> bool {
        self.speakers.iter().any(|s| s.state == PortState::Solo)
    }
}

/// Distance attenuation used by field panning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbapAttenuation {
    /// Lowpass cutoff reached at the far distance
    pub freq_hz: f32,
    /// Attenuation reached at the far distance (0 disables the stage)
    pub attenuation_db: f32,
    /// Distance where attenuation starts
    pub near: f32,
    /// Distance where full attenuation is reached
    pub far: f32,
}

impl Default for LbapAttenuation {
    fn default() -> Self {
        Self {
            freq_hz: 1000.0,
            attenuation_db: 0.0,
            near: 1.0,
            far: 2.0,
        }
    }
}

/// Output channels used by the stereo and binaural modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereoRouting {
    pub left: usize,
    pub right: usize,
}

impl Default for StereoRouting {
    fn default() -> Self {
        Self { left: 0, right: 1 }
    }
}

/// Project-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectData {
    pub sources: Vec<SourceData>,
    pub master_gain_db: f32,
    /// Gain smoothing amount, 0 = linear ramp over one block
    pub gain_interpolation: f32,
    pub lbap_attenuation: LbapAttenuation,
    /// Level of the pink noise test signal, `None` when disabled
    pub pink_noise_db: Option<f32>,
    pub stereo_routing: StereoRouting,
}

impl Default for ProjectData {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            master_gain_db: 0.0,
            gain_interpolation: 0.8,
            lbap_attenuation: LbapAttenuation::default(),
            pink_noise_db: None,
            stereo_routing: StereoRouting::default(),
        }
    }
}

impl ProjectData {
    pub fn with_sources(count: usize) -> Self {
        Self {
            sources: vec![SourceData::default(); count],
            ..Self::default()
        }
    }

    pub fn any_solo(&self) -> bool {
        self.sources.iter().any(|s| s.state == PortState::Solo)
    }

    #[inline]
    pub fn master_gain(&self) -> f32 {
        db_to_gain(self.master_gain_db)
    }
}
