//! Orbit command line
//!
//! Usage:
//!   orbit render <SESSION> -o <DIR>   - Render moving test tones to one WAV per output
//!   orbit triplets <SESSION>          - Print the panning sets of a speaker layout
//!
//! A session file is JSON with `setup` (speakers and mode), optional
//! `project` (sources and mix settings) and optional `settings` (sample
//! rate, block size, HRTF directory).

use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use orbit_core::{Position, ProjectData, SpatMode, SpeakerSetup, gain_to_db};
use orbit_realtime::{EngineSettings, SpatEngine};
use orbit_spatial::SpatAlgorithm;
use serde::Deserialize;

/// Level of each generated test tone
const TONE_LEVEL: f32 = 0.25;
/// Frequency of the first source's tone; source `n` plays `(n + 1)` times this
const BASE_FREQ_HZ: f32 = 220.0;

#[derive(Parser)]
#[command(name = "orbit", about = "Orbit spatial audio renderer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every source as a test tone orbiting the listener
    Render {
        /// Session file (JSON)
        session: PathBuf,
        /// Directory for the output WAV files
        #[arg(short, long, default_value = "orbit-out")]
        output: PathBuf,
        /// Length of the render in seconds
        #[arg(short, long, default_value_t = 4.0)]
        seconds: f32,
        /// Samples per block
        #[arg(short, long, default_value_t = 512)]
        block: usize,
        /// Source rotation speed in degrees per second
        #[arg(short, long, default_value_t = 90.0)]
        rotation: f32,
        /// HRTF directory, overrides the session settings
        #[arg(long)]
        hrtf: Option<PathBuf>,
    },
    /// Print the panning sets built for the session's layout
    Triplets {
        /// Session file (JSON)
        session: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct Session {
    #[serde(default)]
    settings: EngineSettings,
    setup: SpeakerSetup,
    #[serde(default)]
    project: ProjectData,
}

struct RenderOptions {
    output: PathBuf,
    seconds: f32,
    block: usize,
    rotation: f32,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            session,
            output,
            seconds,
            block,
            rotation,
            hrtf,
        } => {
            let mut session = load_session(&session)?;
            if hrtf.is_some() {
                session.settings.hrtf_dir = hrtf;
            }
            let options = RenderOptions {
                output,
                seconds,
                block,
                rotation,
            };
            let peaks = render(session, &options)?;
            print_peaks(&peaks);
            Ok(())
        }
        Commands::Triplets { session } => {
            let session = load_session(&session)?;
            print_triplets(&session.setup)
        }
    }
}

fn load_session(path: &Path) -> Result<Session> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid session file {}", path.display()))
}

// ═══════════════════════════════════════════════════════════════════════════
// RENDER
// ═══════════════════════════════════════════════════════════════════════════

/// Render the session offline and return the last block's output peaks
fn render(session: Session, options: &RenderOptions) -> Result<Vec<f32>> {
    if options.seconds <= 0.0 {
        bail!("Render length must be positive");
    }
    if options.block == 0 || options.block > session.settings.max_block_size {
        bail!(
            "Block size must be between 1 and {}",
            session.settings.max_block_size
        );
    }

    let sample_rate = session.settings.sample_rate;
    let num_sources = session.project.sources.len();
    let num_speakers = session.setup.speakers.len();
    let start: Vec<Option<Position>> = session.project.sources.iter().map(|s| s.position).collect();

    let (mut controller, mut renderer) = SpatEngine::new(session.settings, session.setup, session.project)
        .context("Failed to start engine")?
        .split();

    fs::create_dir_all(&options.output)
        .with_context(|| format!("Failed to create {}", options.output.display()))?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writers = (0..num_speakers)
        .map(|index| {
            let path = options.output.join(format!("out_{index:02}.wav"));
            hound::WavWriter::create(&path, spec)
                .with_context(|| format!("Failed to create {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let total = (options.seconds * sample_rate as f32).round() as usize;
    let mut sources = vec![vec![0.0_f32; options.block]; num_sources];
    let mut speakers = vec![vec![0.0_f32; options.block]; num_speakers];
    let mut phases = vec![0.0_f32; num_sources];
    let mut done = 0;

    while done < total {
        let len = options.block.min(total - done);
        let time = done as f32 / sample_rate as f32;

        for (index, position) in start.iter().enumerate() {
            if let Some(position) = position {
                let mut moved = *position;
                moved.set_azimuth(position.azimuth() + options.rotation * time);
                controller.set_source_position(index, moved)?;
            }
        }

        for (index, (buffer, phase)) in sources.iter_mut().zip(phases.iter_mut()).enumerate() {
            let step = TAU * BASE_FREQ_HZ * (index + 1) as f32 / sample_rate as f32;
            for sample in &mut buffer[..len] {
                *sample = phase.sin() * TONE_LEVEL;
                *phase = (*phase + step) % TAU;
            }
        }

        let mut ins: Vec<&mut [f32]> = sources.iter_mut().map(|b| &mut b[..len]).collect();
        let mut outs: Vec<&mut [f32]> = speakers.iter_mut().map(|b| &mut b[..len]).collect();
        renderer.process_block(&mut ins, &mut outs)?;

        for (writer, buffer) in writers.iter_mut().zip(&speakers) {
            for &sample in &buffer[..len] {
                writer.write_sample(sample)?;
            }
        }
        done += len;
    }

    for writer in writers {
        writer.finalize()?;
    }

    let stats = controller.stats();
    log::info!(
        "Rendered {} blocks ({} samples) to {}",
        stats.rendered_blocks,
        total,
        options.output.display()
    );
    Ok(controller.speaker_peaks().to_vec())
}

fn print_peaks(peaks: &[f32]) {
    println!("Output peaks:");
    for (index, &peak) in peaks.iter().enumerate() {
        println!("  out {index:2}: {:7.1} dB", gain_to_db(peak));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LAYOUT INSPECTION
// ═══════════════════════════════════════════════════════════════════════════

fn print_triplets(setup: &SpeakerSetup) -> Result<()> {
    let algorithm = SpatAlgorithm::build(setup).context("Failed to build topology")?;
    let sets = algorithm.triplets();
    println!("{} mode, {} speakers, {} panning sets", setup.spat_mode, setup.speakers.len(), sets.len());

    // Binaural sets index the virtual dome, not the layout
    let virtual_dome = setup.spat_mode == SpatMode::Binaural;
    for (index, set) in sets.iter().enumerate() {
        let members: Vec<String> = set
            .outputs()
            .iter()
            .map(|&output| match setup.speakers.get(output) {
                Some(speaker) if !virtual_dome => speaker.id.to_string(),
                _ => format!("v{output}"),
            })
            .collect();
        println!("  {index:3}: {}", members.join(" "));
    }
    Ok(())
}
