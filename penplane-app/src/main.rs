mod actuator;
mod app;
mod cli;
mod sources;

use anyhow::{Context, Result};
use app::App;
use cli::{Cli, Commands};
use penplane_experiment::ExperimentConfig;
use penplane_timing::HighPrecisionTimer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sources::{JsonLinesSource, SyntheticParams, SyntheticSource};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => {
            info!("no configuration given, using defaults");
            ExperimentConfig::default()
        }
    };

    let timer = HighPrecisionTimer::new();
    let app = App::new(config.clone(), cli.output.clone());

    let outcome = match cli.command {
        Commands::Run {
            markers,
            buttons,
            rate_hz,
        } => {
            let file = File::open(&markers)
                .with_context(|| format!("failed to open marker recording {}", markers.display()))?;
            let mut source = JsonLinesSource::new(BufReader::new(file));
            if let Some(rate) = rate_hz.filter(|r| *r > 0.0) {
                source = source.paced(timer.clone(), Duration::from_secs_f64(1.0 / rate));
            }
            let buttons = match buttons {
                Some(path) => {
                    let feed = File::open(&path)
                        .with_context(|| format!("failed to open button feed {}", path.display()))?;
                    Some(Box::new(BufReader::new(feed)) as Box<dyn BufRead + Send>)
                }
                None => None,
            };
            app.run(source, timer, buttons, None)?
        }
        Commands::Simulate {
            rate_hz,
            noise_mm,
            dropout,
            height_mm,
            sweep_secs,
            duration_secs,
            seed,
        } => {
            anyhow::ensure!(rate_hz > 0.0, "--rate-hz must be positive");
            anyhow::ensure!((0.0..=1.0).contains(&dropout), "--dropout must be in [0, 1]");
            let seed = seed.unwrap_or_else(|| rand::rng().random());
            info!("simulating at {} Hz with seed {}", rate_hz, seed);
            let params = SyntheticParams {
                interval: Duration::from_secs_f64(1.0 / rate_hz),
                noise_mm: noise_mm.abs(),
                dropout,
                sweep: Duration::from_secs_f64(sweep_secs.max(0.1)),
                hover_mm: 1.0,
            };
            let source = SyntheticSource::new(
                timer.clone(),
                StdRng::seed_from_u64(seed),
                params,
                config.layout,
                config.projection,
                config.screen_width_mm,
                height_mm,
            )?;
            app.run(
                source,
                timer,
                None,
                Some(Duration::from_secs(duration_secs)),
            )?
        }
    };

    let summary = &outcome.summary;
    info!(
        "participant {}: {}/{} trials{} | mean MT {} | mean TP {} | {} button presses",
        summary.participant_id,
        summary.completed_trials,
        summary.expected_trials,
        if summary.complete { "" } else { " (incomplete)" },
        summary
            .mean_movement_time_ms
            .map_or("-".to_string(), |v| format!("{v:.1} ms")),
        summary
            .mean_throughput
            .map_or("-".to_string(), |v| format!("{v:.2} bit/s")),
        outcome
            .clicks
            .iter()
            .filter(|c| c.source == penplane_core::ClickSource::Button)
            .count()
    );
    info!(
        "{} frames processed, {} skipped, {} written",
        outcome.report.counters.processed,
        outcome.report.counters.skipped(),
        outcome.frames_logged
    );

    Ok(())
}
