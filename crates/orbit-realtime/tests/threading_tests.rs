//! Control/audio thread interaction
//!
//! The audio side runs in its own thread while the control side moves
//! sources, swaps configurations and rebuilds topologies. Every block must
//! either render completely or be skipped, and the output must stay sane.

use orbit_core::{Position, ProjectData, SpatMode, SpeakerData, SpeakerSetup};
use orbit_realtime::{BlockOutcome, EngineSettings, SpatEngine};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const BLOCK: usize = 256;
const BLOCKS: usize = 2000;

fn dome() -> SpeakerSetup {
    SpeakerSetup::new(
        vec![
            SpeakerData::at(1, -30.0, 0.0),
            SpeakerData::at(2, 30.0, 0.0),
            SpeakerData::at(3, 110.0, 0.0),
            SpeakerData::at(4, -110.0, 0.0),
            SpeakerData::at(5, 0.0, 60.0),
            SpeakerData::at(6, 180.0, 45.0),
        ],
        SpatMode::Vbap,
    )
}

#[test]
fn test_moving_sources_while_rendering() {
    let (mut controller, mut renderer) =
        SpatEngine::new(EngineSettings::default(), dome(), ProjectData::with_sources(4))
            .unwrap()
            .split();
    let done = Arc::new(AtomicBool::new(false));

    let audio_done = Arc::clone(&done);
    let audio = thread::spawn(move || {
        let mut sources = vec![vec![0.25_f32; BLOCK]; 4];
        let mut speakers = vec![vec![0.0_f32; BLOCK]; 6];
        let mut max_out = 0.0_f32;
        for _ in 0..BLOCKS {
            for source in &mut sources {
                source.fill(0.25);
            }
            let mut ins: Vec<&mut [f32]> = sources.iter_mut().map(Vec::as_mut_slice).collect();
            let mut outs: Vec<&mut [f32]> = speakers.iter_mut().map(Vec::as_mut_slice).collect();
            assert_eq!(renderer.process_block(&mut ins, &mut outs).unwrap(), BlockOutcome::Rendered);
            for sample in speakers.iter().flatten() {
                assert!(sample.is_finite());
                max_out = max_out.max(sample.abs());
            }
        }
        audio_done.store(true, Ordering::Release);
        max_out
    });

    let mut step = 0_u32;
    while !done.load(Ordering::Acquire) {
        for index in 0..4 {
            let azimuth = (step as f32 * 3.7 + index as f32 * 90.0) % 360.0 - 180.0;
            let elevation = (step % 50) as f32;
            controller
                .set_source_position(index, Position::from_polar(azimuth, elevation, 1.0))
                .unwrap();
        }
        step += 1;
        if step % 64 == 0 {
            let _ = controller.source_peaks();
            let _ = controller.speaker_peaks();
        }
        thread::yield_now();
    }

    let max_out = audio.join().unwrap();
    // Four sources at 0.25 with unit-norm gains cannot exceed 1.0 per speaker
    assert!(max_out <= 1.0 + 1e-4, "max output {max_out}");
    assert!(max_out > 0.0);
    assert_eq!(controller.stats().rendered_blocks, BLOCKS as u64);
}

#[test]
fn test_reconfiguration_skips_whole_blocks() {
    let (mut controller, mut renderer) =
        SpatEngine::new(EngineSettings::default(), dome(), ProjectData::with_sources(2))
            .unwrap()
            .split();
    let done = Arc::new(AtomicBool::new(false));

    let audio_done = Arc::clone(&done);
    let audio = thread::spawn(move || {
        let mut sources = vec![vec![0.0_f32; BLOCK]; 2];
        let mut speakers = vec![vec![0.0_f32; BLOCK]; 6];
        let mut skipped = 0_u64;
        for _ in 0..BLOCKS {
            for source in &mut sources {
                source.fill(0.5);
            }
            for speaker in &mut speakers {
                speaker.fill(f32::NAN);
            }
            let mut ins: Vec<&mut [f32]> = sources.iter_mut().map(Vec::as_mut_slice).collect();
            let mut outs: Vec<&mut [f32]> = speakers.iter_mut().map(Vec::as_mut_slice).collect();
            match renderer.process_block(&mut ins, &mut outs).unwrap() {
                BlockOutcome::Rendered => {
                    assert!(speakers.iter().flatten().all(|s| s.is_finite()));
                }
                BlockOutcome::Skipped => {
                    // Nothing was touched
                    assert!(speakers.iter().flatten().all(|s| s.is_nan()));
                    assert!(sources.iter().flatten().all(|&s| s == 0.5));
                    skipped += 1;
                }
            }
        }
        audio_done.store(true, Ordering::Release);
        skipped
    });

    let modes = [SpatMode::Vbap, SpatMode::Lbap, SpatMode::Stereo];
    let mut round = 0;
    while !done.load(Ordering::Acquire) {
        let mut setup = dome();
        setup.spat_mode = modes[round % modes.len()];
        setup.speakers[round % 6].gain_db = -3.0;
        controller.set_topology(setup).unwrap();

        let mut project = ProjectData::with_sources(2);
        project.master_gain_db = -((round % 12) as f32);
        controller.set_config(project).unwrap();
        controller.reset_hrtf();
        round += 1;
    }

    let skipped = audio.join().unwrap();
    let stats = controller.stats();
    assert_eq!(stats.rendered_blocks + stats.skipped_blocks, BLOCKS as u64);
    assert_eq!(stats.skipped_blocks, skipped);
}
