//! End-to-end render pipeline tests
//!
//! Drives the engine through its public handles:
//! - gain smoothing as heard at the speakers
//! - silence, mute, solo and direct-out routing
//! - binaural convolution and stereo compensation
//! - topology changes and rejection

use approx::assert_relative_eq;
use orbit_core::{
    HRTF_TAPS, OrbitError, PortState, Position, ProjectData, SpatMode, SpeakerData, SpeakerSetup,
    db_to_gain,
};
use orbit_realtime::{
    AudioRenderer, BlockOutcome, EngineError, EngineSettings, SpatController, SpatEngine,
};
use orbit_spatial::hrtf::Impulse;
use orbit_spatial::{HrtfBank, SpatialError};

const BLOCK: usize = 128;

/// Owned source and speaker buffers for one engine
struct Buffers {
    sources: Vec<Vec<f32>>,
    speakers: Vec<Vec<f32>>,
}

impl Buffers {
    fn new(num_sources: usize, num_speakers: usize, len: usize) -> Self {
        Self {
            sources: vec![vec![0.0; len]; num_sources],
            speakers: vec![vec![0.0; len]; num_speakers],
        }
    }

    fn render(&mut self, renderer: &mut AudioRenderer) -> Result<BlockOutcome, OrbitError> {
        let mut sources: Vec<&mut [f32]> = self.sources.iter_mut().map(Vec::as_mut_slice).collect();
        let mut speakers: Vec<&mut [f32]> = self.speakers.iter_mut().map(Vec::as_mut_slice).collect();
        renderer.process_block(&mut sources, &mut speakers)
    }
}

fn quad(mode: SpatMode) -> SpeakerSetup {
    SpeakerSetup::new(
        vec![
            SpeakerData::at(1, -45.0, 0.0),
            SpeakerData::at(2, 45.0, 0.0),
            SpeakerData::at(3, 135.0, 0.0),
            SpeakerData::at(4, -135.0, 0.0),
        ],
        mode,
    )
}

fn linear_project(positions: &[(f32, f32)]) -> ProjectData {
    let mut project = ProjectData::with_sources(positions.len());
    project.gain_interpolation = 0.0;
    for (source, &(azimuth, elevation)) in project.sources.iter_mut().zip(positions) {
        source.position = Some(Position::from_polar(azimuth, elevation, 1.0));
    }
    project
}

fn start(setup: SpeakerSetup, project: ProjectData) -> (SpatController, AudioRenderer) {
    let settings = EngineSettings {
        noise_seed: Some(7),
        ..EngineSettings::default()
    };
    SpatEngine::new(settings, setup, project).unwrap().split()
}

fn sine(len: usize, freq: f32, offset: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * (i + offset) as f32 / 48_000.0).sin() * 0.5)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// GAIN SMOOTHING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_linear_ramp_reaches_target_in_one_block() {
    let (_controller, mut renderer) = start(quad(SpatMode::Vbap), linear_project(&[(-45.0, 0.0)]));
    let mut buffers = Buffers::new(1, 4, BLOCK);
    buffers.sources[0].fill(1.0);

    assert_eq!(buffers.render(&mut renderer).unwrap(), BlockOutcome::Rendered);
    let out = &buffers.speakers[0];
    for (n, &sample) in out.iter().enumerate() {
        assert_relative_eq!(sample, (n + 1) as f32 / BLOCK as f32, epsilon = 1e-4);
    }
    assert!(out.windows(2).all(|w| w[1] > w[0]));
    assert!(buffers.speakers[1..].iter().flatten().all(|&s| s.abs() < 1e-4));

    buffers.sources[0].fill(1.0);
    buffers.render(&mut renderer).unwrap();
    assert!(buffers.speakers[0].iter().all(|&s| (s - 1.0).abs() < 1e-4));
}

#[test]
fn test_exponential_ramp_follows_position_change() {
    let mut project = linear_project(&[(-45.0, 0.0)]);
    project.gain_interpolation = 0.5;
    let (mut controller, mut renderer) = start(quad(SpatMode::Vbap), project);
    let mut buffers = Buffers::new(1, 4, BLOCK);

    for _ in 0..200 {
        buffers.sources[0].fill(1.0);
        buffers.render(&mut renderer).unwrap();
    }
    assert_relative_eq!(buffers.speakers[0][BLOCK - 1], 1.0, epsilon = 1e-3);

    controller
        .set_source_position(0, Position::from_polar(45.0, 0.0, 1.0))
        .unwrap();
    buffers.sources[0].fill(1.0);
    buffers.render(&mut renderer).unwrap();

    let factor = 0.5_f32.powf(0.1) * 0.0099 + 0.99;
    for n in [1, 10, 128] {
        let expected = factor.powi(n as i32);
        assert_relative_eq!(buffers.speakers[0][n - 1], expected, epsilon = 1e-3);
    }
    // Fading in on the new speaker while the old one fades out
    assert!(buffers.speakers[1][BLOCK - 1] > buffers.speakers[1][0]);
}

// ═══════════════════════════════════════════════════════════════════════════
// GATING AND ROUTING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_silent_source_leaves_output_unchanged() {
    let (_c1, mut with_silent) = start(quad(SpatMode::Vbap), linear_project(&[(10.0, 0.0), (-100.0, 0.0)]));
    let (_c2, mut alone) = start(quad(SpatMode::Vbap), linear_project(&[(10.0, 0.0)]));
    let mut a = Buffers::new(2, 4, BLOCK);
    let mut b = Buffers::new(1, 4, BLOCK);

    for block in 0..4 {
        let signal = sine(BLOCK, 440.0, block * BLOCK);
        a.sources[0].copy_from_slice(&signal);
        a.sources[1].fill(0.0);
        b.sources[0].copy_from_slice(&signal);
        a.render(&mut with_silent).unwrap();
        b.render(&mut alone).unwrap();
        assert_eq!(a.speakers, b.speakers);
    }
}

#[test]
fn test_silent_source_reports_zero_peak() {
    let (mut controller, mut renderer) = start(quad(SpatMode::Vbap), linear_project(&[(10.0, 0.0), (-100.0, 0.0)]));
    let mut buffers = Buffers::new(2, 4, BLOCK);
    buffers.sources[0].copy_from_slice(&sine(BLOCK, 440.0, 0));
    buffers.render(&mut renderer).unwrap();

    let peaks = controller.source_peaks().to_vec();
    assert!(peaks[0] > 0.4);
    assert_eq!(peaks[1], 0.0);
}

#[test]
fn test_muted_speaker_is_silent() {
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers[0].state = PortState::Muted;
    setup.speakers[0].gain_db = 6.0;
    setup.speakers[0].highpass_hz = Some(80.0);
    let (mut controller, mut renderer) = start(setup, linear_project(&[(-45.0, 0.0), (45.0, 0.0)]));
    let mut buffers = Buffers::new(2, 4, BLOCK);

    for _ in 0..3 {
        buffers.sources[0].fill(0.8);
        buffers.sources[1].fill(0.8);
        buffers.render(&mut renderer).unwrap();
    }
    assert!(buffers.speakers[0].iter().all(|&s| s == 0.0));
    let peaks = controller.speaker_peaks().to_vec();
    assert_eq!(peaks[0], 0.0);
    assert!(peaks[1] > 0.5);
}

#[test]
fn test_solo_silences_other_ports() {
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers[1].state = PortState::Solo;
    let mut project = linear_project(&[(-45.0, 0.0), (45.0, 0.0)]);
    project.sources[0].state = PortState::Solo;
    let (mut controller, mut renderer) = start(setup, project);
    let mut buffers = Buffers::new(2, 4, BLOCK);

    buffers.sources[0].fill(0.5);
    buffers.sources[1].fill(0.5);
    buffers.render(&mut renderer).unwrap();

    // Source 1 is silenced by the solo on source 0 and zeroed in place
    assert!(buffers.sources[1].iter().all(|&s| s == 0.0));
    assert_eq!(controller.source_peaks()[1], 0.0);
    // Source 0 pans to speaker 0, which is silenced by the solo on speaker 1
    assert!(buffers.speakers.iter().flatten().all(|&s| s.abs() < 1e-4));
}

#[test]
fn test_direct_out_bypasses_panning() {
    let mut project = linear_project(&[(0.0, 0.0)]);
    project.sources[0].direct_out = Some(3);
    let (_controller, mut renderer) = start(quad(SpatMode::Vbap), project);
    let mut buffers = Buffers::new(1, 4, BLOCK);
    let signal = sine(BLOCK, 220.0, 0);
    buffers.sources[0].copy_from_slice(&signal);
    buffers.render(&mut renderer).unwrap();

    assert_eq!(buffers.speakers[2], signal);
    for index in [0, 1, 3] {
        assert!(buffers.speakers[index].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_master_and_speaker_gain() {
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers[0].gain_db = -6.0;
    let mut project = linear_project(&[(-45.0, 0.0)]);
    project.master_gain_db = -6.0;
    let (_controller, mut renderer) = start(setup, project);
    let mut buffers = Buffers::new(1, 4, BLOCK);

    for _ in 0..2 {
        buffers.sources[0].fill(1.0);
        buffers.render(&mut renderer).unwrap();
    }
    assert_relative_eq!(buffers.speakers[0][BLOCK - 1], db_to_gain(-12.0), epsilon = 1e-4);
}

#[test]
fn test_speaker_highpass_removes_dc() {
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers[0].highpass_hz = Some(200.0);
    let (mut controller, mut renderer) = start(setup, linear_project(&[(-45.0, 0.0), (45.0, 0.0)]));
    let mut buffers = Buffers::new(2, 4, BLOCK);

    for _ in 0..40 {
        for source in &mut buffers.sources {
            source.fill(1.0);
        }
        buffers.render(&mut renderer).unwrap();
    }

    // Unfiltered neighbour passes DC untouched
    assert_relative_eq!(buffers.speakers[1][BLOCK - 1], 1.0, epsilon = 1e-4);
    assert!(buffers.speakers[0][BLOCK - 1].abs() < 0.05);
    let peaks = controller.speaker_peaks();
    assert!(peaks[0] < 0.05, "filtered peak {}", peaks[0]);
    assert_relative_eq!(peaks[1], 1.0, epsilon = 1e-4);
}

#[test]
fn test_pink_noise_replaces_panning() {
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers[3].state = PortState::Muted;
    let mut project = linear_project(&[(-45.0, 0.0)]);
    project.pink_noise_db = Some(-12.0);
    let (_controller, mut renderer) = start(setup, project);
    let mut buffers = Buffers::new(1, 4, BLOCK);
    buffers.render(&mut renderer).unwrap();

    assert!(buffers.speakers[0].iter().any(|&s| s != 0.0));
    assert_eq!(buffers.speakers[0], buffers.speakers[1]);
    assert_eq!(buffers.speakers[0], buffers.speakers[2]);
    assert!(buffers.speakers[3].iter().all(|&s| s == 0.0));
}

#[test]
fn test_field_attenuation_by_distance() {
    let render_at = |distance: f32| {
        let mut project = ProjectData::with_sources(1);
        project.gain_interpolation = 0.0;
        project.lbap_attenuation.attenuation_db = -36.0;
        project.sources[0].position = Some(Position::from_polar(0.0, 0.0, distance));
        let (mut controller, mut renderer) = start(quad(SpatMode::Lbap), project);
        let mut buffers = Buffers::new(1, 4, BLOCK);
        for _ in 0..4 {
            buffers.sources[0].fill(1.0);
            buffers.render(&mut renderer).unwrap();
        }
        controller.speaker_peaks().iter().sum::<f32>()
    };

    let near = render_at(0.5);
    let far = render_at(4.0);
    assert!(near > 0.9, "near sum {near}");
    assert!(far < 0.1, "far sum {far}");
}

// ═══════════════════════════════════════════════════════════════════════════
// BINAURAL AND STEREO
// ═══════════════════════════════════════════════════════════════════════════

fn ramp_bank() -> HrtfBank {
    let mut left: Vec<Impulse> = vec![[0.0; HRTF_TAPS]; 16];
    let mut right: Vec<Impulse> = vec![[0.0; HRTF_TAPS]; 16];
    for channel in 0..16 {
        for tap in 0..HRTF_TAPS {
            left[channel][tap] = (channel * HRTF_TAPS + tap) as f32 * 1e-4;
            right[channel][tap] = -((tap % 7) as f32) * 0.01 - channel as f32 * 1e-3;
        }
    }
    HrtfBank::from_impulses(left, right).unwrap()
}

fn stereo_setup(mode: SpatMode) -> SpeakerSetup {
    SpeakerSetup::new(
        vec![
            SpeakerData::at(1, -30.0, 0.0),
            SpeakerData::at(2, 30.0, 0.0),
            SpeakerData::at(3, 180.0, 0.0),
        ],
        mode,
    )
}

#[test]
fn test_binaural_impulse_reproduces_hrtf() {
    let bank = ramp_bank();
    let (mut controller, mut renderer) = SpatEngine::with_hrtf(
        EngineSettings::default(),
        Some(bank.clone()),
        stereo_setup(SpatMode::Binaural),
        linear_project(&[(20.0, 0.0)]),
    )
    .unwrap()
    .split();
    let mut buffers = Buffers::new(1, 3, BLOCK);

    // Settle the smoothed gains, then start from an empty history
    buffers.sources[0].fill(1.0);
    buffers.render(&mut renderer).unwrap();
    controller.reset_hrtf();

    buffers.sources[0].fill(0.0);
    buffers.sources[0][0] = 1.0;
    buffers.render(&mut renderer).unwrap();

    // Virtual speaker 4 sits at azimuth 20 on the horizontal ring
    for tap in 0..HRTF_TAPS {
        assert_relative_eq!(buffers.speakers[0][tap], bank.left(4)[tap], epsilon = 1e-4);
        assert_relative_eq!(buffers.speakers[1][tap], bank.right(4)[tap], epsilon = 1e-4);
    }
    assert!(buffers.speakers[2].iter().all(|&s| s == 0.0));
}

#[test]
fn test_binaural_honours_routing() {
    let mut project = linear_project(&[(20.0, 0.0)]);
    project.stereo_routing.left = 2;
    project.stereo_routing.right = 0;
    let (_controller, mut renderer) = SpatEngine::with_hrtf(
        EngineSettings::default(),
        Some(ramp_bank()),
        stereo_setup(SpatMode::Binaural),
        project,
    )
    .unwrap()
    .split();
    let mut buffers = Buffers::new(1, 3, BLOCK);
    buffers.sources[0].fill(0.5);
    buffers.render(&mut renderer).unwrap();

    assert!(buffers.speakers[2].iter().any(|&s| s > 0.0));
    assert!(buffers.speakers[0].iter().any(|&s| s < 0.0));
    assert!(buffers.speakers[1].iter().all(|&s| s == 0.0));
}

#[test]
fn test_stereo_loudness_compensation() {
    let render = |sources: usize| {
        let project = linear_project(&vec![(0.0, 0.0); sources]);
        let (_controller, mut renderer) = start(stereo_setup(SpatMode::Stereo), project);
        let mut buffers = Buffers::new(sources, 3, BLOCK);
        for _ in 0..2 {
            buffers.sources[0].fill(0.5);
            buffers.render(&mut renderer).unwrap();
        }
        (buffers.speakers[0][BLOCK - 1], buffers.speakers[1][BLOCK - 1], buffers.speakers[2].clone())
    };

    let centre = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
    let (left, right, unused) = render(1);
    assert_relative_eq!(left, centre, epsilon = 1e-4);
    assert_relative_eq!(right, centre, epsilon = 1e-4);
    assert!(unused.iter().all(|&s| s == 0.0));

    let (left, right, _) = render(4);
    let compensation = 10.0_f32.powf(3.0 * -0.005);
    assert_relative_eq!(left, centre * compensation, epsilon = 1e-4);
    assert_relative_eq!(right, centre * compensation, epsilon = 1e-4);
}

// ═══════════════════════════════════════════════════════════════════════════
// TOPOLOGY AND SHAPE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_rejected_topology_keeps_previous() {
    let (mut controller, mut renderer) = start(quad(SpatMode::Vbap), linear_project(&[(0.0, 0.0)]));

    let single = SpeakerSetup::new(vec![SpeakerData::at(1, 0.0, 0.0)], SpatMode::Vbap);
    assert!(matches!(
        controller.set_topology(single),
        Err(EngineError::Spatial(SpatialError::NotEnoughSpeakers { got: 1, .. }))
    ));
    let empty = SpeakerSetup::new(Vec::new(), SpatMode::Vbap);
    assert!(controller.set_topology(empty).is_err());

    assert_eq!(controller.setup().speakers.len(), 4);
    assert_eq!(controller.algorithm().num_gain_channels(), 4);
    let mut buffers = Buffers::new(1, 4, BLOCK);
    buffers.sources[0].fill(0.5);
    assert_eq!(buffers.render(&mut renderer).unwrap(), BlockOutcome::Rendered);
}

#[test]
fn test_topology_change_resizes_outputs() {
    let (mut controller, mut renderer) = start(quad(SpatMode::Vbap), linear_project(&[(0.0, 0.0)]));
    let mut setup = quad(SpatMode::Vbap);
    setup.speakers.push(SpeakerData::at(5, 0.0, 60.0));
    controller.set_topology(setup).unwrap();
    assert_eq!(controller.algorithm().num_gain_channels(), 5);

    let mut old_shape = Buffers::new(1, 4, BLOCK);
    assert!(matches!(
        old_shape.render(&mut renderer),
        Err(OrbitError::ChannelMismatch { kind: "speaker", expected: 5, got: 4 })
    ));

    let mut buffers = Buffers::new(1, 5, BLOCK);
    buffers.sources[0].fill(0.5);
    buffers.render(&mut renderer).unwrap();
    assert_eq!(controller.speaker_peaks().len(), 5);
}

#[test]
fn test_mode_switch_to_binaural_without_hrtf_fails() {
    let (mut controller, _renderer) = start(quad(SpatMode::Vbap), linear_project(&[(0.0, 0.0)]));
    assert!(matches!(
        controller.set_topology(quad(SpatMode::Binaural)),
        Err(EngineError::HrtfUnavailable)
    ));
    assert_eq!(controller.mode(), SpatMode::Vbap);
}

#[test]
fn test_buffer_shape_errors() {
    let (_controller, mut renderer) = start(quad(SpatMode::Vbap), linear_project(&[(0.0, 0.0)]));

    let mut too_long = Buffers::new(1, 4, 4096);
    assert!(matches!(
        too_long.render(&mut renderer),
        Err(OrbitError::BlockTooLarge { got: 4096, .. })
    ));

    let mut ragged = Buffers::new(1, 4, BLOCK);
    ragged.sources[0].truncate(64);
    assert!(matches!(
        ragged.render(&mut renderer),
        Err(OrbitError::BlockLengthMismatch { expected: 128, got: 64 })
    ));
}
