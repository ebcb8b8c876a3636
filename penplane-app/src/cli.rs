use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pen-on-display touch detection for a mocap Fitts' task.
#[derive(Parser, Debug)]
#[command(name = "penplane")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Experiment configuration (TOML, or JSON by extension)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Session directory for frames.jsonl, clicks.json and summary.json
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded marker stream
    Run {
        /// JSON-lines marker recording, one frame per line
        #[arg(short, long)]
        markers: PathBuf,

        /// Line-oriented button feed ("1" = press), e.g. a serial device node
        #[arg(short, long)]
        buttons: Option<PathBuf>,

        /// Replay at this frame rate instead of as fast as possible
        #[arg(long)]
        rate_hz: Option<f64>,
    },

    /// Drive the pipeline with a synthetic pen sweeping over the display
    Simulate {
        /// Frame rate of the generated stream
        #[arg(long, default_value = "200")]
        rate_hz: f64,

        /// Uniform positional noise, mm
        #[arg(long, default_value = "0.5")]
        noise_mm: f64,

        /// Probability that a frame loses a corner marker
        #[arg(long, default_value = "0.02")]
        dropout: f64,

        /// Physical height of the simulated display, mm
        #[arg(long, default_value = "194")]
        height_mm: f64,

        /// Seconds for one full left-right-left sweep
        #[arg(long, default_value = "1.5")]
        sweep_secs: f64,

        /// Stop after this many seconds even if trials remain
        #[arg(long, default_value = "60")]
        duration_secs: u64,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
