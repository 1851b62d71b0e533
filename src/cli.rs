use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::SequenceConfig;
use crate::headless::{simulate, SimulationOptions};
use crate::waveform::Waveform;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sequence against an in-memory stage and dump a frame trace
    Simulate {
        /// Soundtrack samples (JSON array of floats, or whitespace separated floats)
        #[arg(long)]
        waveform: Option<PathBuf>,

        /// Sample rate of the waveform file
        #[arg(long, default_value_t = 8_000.0)]
        sample_rate: f32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Cancel the sequence this many milliseconds after activation
        #[arg(long)]
        cancel_at: Option<f64>,

        /// Seed for camera jitter
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Simulate a host that refuses to start playback
        #[arg(long)]
        reject_playback: bool,

        /// Sequence config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file for the trace (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the phase table
    Timeline {
        /// Soundtrack time left at the showcase, in seconds; the table is stretched to fit it
        #[arg(long)]
        audio_duration: Option<f64>,

        /// Sequence config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            waveform,
            sample_rate,
            fps,
            cancel_at,
            seed,
            reject_playback,
            config,
            out,
        } => {
            let waveform = waveform
                .map(|path| Waveform::load(&path, sample_rate))
                .transpose()?;
            let options = SimulationOptions {
                config: load_config(config.as_deref())?,
                waveform,
                fps,
                cancel_at,
                seed,
                reject_playback,
                ..SimulationOptions::default()
            };
            let trace = simulate(options)?;
            write_json(out.as_deref(), &trace)?;
        }
        Commands::Timeline {
            audio_duration,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let base = config.timeline()?;
            let timeline = match audio_duration {
                Some(seconds) => base.fitted(seconds * 1000.0, config.nominal_duration_ms),
                None => base,
            };
            write_json(None, &timeline)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SequenceConfig> {
    match path {
        Some(path) => SequenceConfig::load(path),
        None => Ok(SequenceConfig::default()),
    }
}

fn write_json<T: serde::Serialize>(out: Option<&Path>, value: &T) -> Result<()> {
    let writer: Box<dyn Write> = match out {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    if let Some(path) = out {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}
