use crate::actuator::{ActuatorDriver, LoggingActuator};
use anyhow::{Context, Result, anyhow};
use penplane_bus::{BusError, EventStream, Retained, Subscription};
use penplane_core::{ClickRecord, FrameOutcome, MarkerSource, PipelineEvent};
use penplane_experiment::{
    ButtonListener, ClickLedger, ExperimentConfig, FrameCursor, PipelineBus, PipelineRunner,
    RunnerOptions, SessionReport, StopSignal, TrialLog, TrialSummary,
};
use penplane_timing::Timer;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many processed frames the logger may fall behind before it loses some.
const FRAME_DEPTH: usize = 1024;
/// Frames kept for button-press correlation, a few seconds at mocap rates.
const CURSOR_DEPTH: usize = 2048;
const HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SessionOutcome {
    pub report: SessionReport,
    pub summary: TrialSummary,
    pub clicks: Vec<ClickRecord>,
    pub frames_logged: usize,
}

/// Wires one session together: the pipeline thread, the button listener and
/// the bus consumers (trial manager, feedback driver, frame logger).
pub struct App {
    config: ExperimentConfig,
    output: Option<PathBuf>,
    options: RunnerOptions,
}

fn spawn_named<F, R>(name: &str, f: F) -> Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .with_context(|| format!("failed to spawn {name} thread"))
}

fn join<R>(name: &str, handle: JoinHandle<R>) -> Result<R> {
    handle.join().map_err(|_| anyhow!("{name} thread panicked"))
}

impl App {
    pub fn new(config: ExperimentConfig, output: Option<PathBuf>) -> Self {
        Self {
            config,
            output,
            options: RunnerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run<S, T>(
        self,
        source: S,
        timer: T,
        buttons: Option<Box<dyn BufRead + Send>>,
        max_duration: Option<Duration>,
    ) -> Result<SessionOutcome>
    where
        S: MarkerSource + 'static,
        T: Timer<Timestamp = u64> + 'static,
    {
        let bus = Arc::new(PipelineBus::new(FRAME_DEPTH));
        let handoff = Arc::new(Retained::<PathBuf>::new());
        let cursor = FrameCursor::new(CURSOR_DEPTH);
        let ledger = ClickLedger::new();

        // consumers subscribe before the pipeline starts publishing
        let trial_events = bus.subscribe_events();
        let feedback_events = bus.subscribe_events();
        let frames = bus.subscribe_frames();

        let config_timeout = self.options.config_timeout;
        let trial_manager = {
            let bus = Arc::clone(&bus);
            let timer = timer.clone();
            spawn_named("trial-manager", move || {
                manage_trials(&bus, trial_events, timer, config_timeout)
            })?
        };
        let feedback = spawn_named("feedback-driver", move || {
            drive_feedback(feedback_events, LoggingActuator::default())
        })?;
        let logger = match &self.output {
            Some(_) => {
                let handoff = Arc::clone(&handoff);
                Some(spawn_named("frame-logger", move || log_frames(frames, &handoff))?)
            }
            None => None,
        };

        let runner = PipelineRunner::new(Arc::clone(&bus), source, timer.clone(), self.options)
            .with_clicks(cursor.clone(), ledger.clone());
        let stop = runner.stop_signal();
        let pipeline = runner.spawn().context("failed to spawn pipeline thread")?;

        let listener = match buttons {
            Some(reader) => Some(
                ButtonListener::new(timer.clone(), cursor, ledger.clone())
                    .with_stop(stop.clone())
                    .spawn(reader)
                    .context("failed to spawn button listener")?,
            ),
            None => None,
        };

        if let Some(limit) = max_duration {
            let stop = stop.clone();
            let bus = Arc::clone(&bus);
            spawn_named("session-limit", move || watch_limit(&stop, &bus, limit))?;
        }

        if let Some(dir) = &self.output {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create session directory {}", dir.display()))?;
            handoff.set(dir.clone())?;
        }
        bus.publish_config(self.config.clone())?;

        let report = join("pipeline", pipeline)??;
        stop.stop();
        if let Some(handle) = listener {
            // a feed that is still open would block the join
            if handle.is_finished() {
                if let Err(e) = join("button-listener", handle)? {
                    info!("button feed: {}", e);
                }
            } else {
                debug!("button feed still open at session end");
            }
        }
        let summary = join("trial-manager", trial_manager)??;
        join("feedback-driver", feedback)??;
        let frames_logged = match logger {
            Some(handle) => join("frame-logger", handle)??,
            None => 0,
        };

        let clicks = ledger.snapshot();
        if let Some(dir) = &self.output {
            write_json(dir.join("summary.json"), &summary)?;
            write_json(dir.join("clicks.json"), &clicks)?;
            info!("session written to {}", dir.display());
        }

        Ok(SessionOutcome {
            report,
            summary,
            clicks,
            frames_logged,
        })
    }
}

fn watch_limit(stop: &StopSignal, bus: &PipelineBus, limit: Duration) {
    let step = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if bus.is_closed() {
            return;
        }
        thread::sleep(step.min(limit - waited));
        waited += step;
    }
    if stop.stop() {
        warn!("session time limit of {:?} reached, stopping", limit);
    }
}

fn manage_trials<T>(
    bus: &PipelineBus,
    events: EventStream<PipelineEvent>,
    timer: T,
    config_timeout: Duration,
) -> Result<TrialSummary>
where
    T: Timer<Timestamp = u64>,
{
    let config = bus
        .wait_config(config_timeout)
        .context("trial manager did not receive a configuration")?;
    config.validate()?;
    let mut log = TrialLog::new(&config, timer.now());

    for event in events.iter() {
        match event {
            PipelineEvent::Trigger(trigger) => {
                log.record(&trigger);
            }
            PipelineEvent::TrialComplete { triggers } => {
                info!("all {} trials done", triggers);
            }
            PipelineEvent::Ended(end) => log.end(end),
            PipelineEvent::Feedback { .. } => {}
        }
    }
    Ok(log.summary())
}

fn drive_feedback<A: ActuatorDriver>(events: EventStream<PipelineEvent>, mut actuator: A) -> Result<()> {
    for event in events.iter() {
        if let PipelineEvent::Feedback { frame, command } = event {
            actuator.apply(frame, command)?;
        }
    }
    Ok(())
}

/// Writes every sampled frame as a JSON line into the session directory
/// handed over at start-up. Returns the number of rows written.
fn log_frames(frames: Subscription<FrameOutcome>, handoff: &Retained<PathBuf>) -> Result<usize> {
    let dir = handoff
        .wait(HANDOFF_TIMEOUT)
        .context("no session directory was handed over")?;
    let path = dir.join("frames.jsonl");
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut rows = 0;
    loop {
        match frames.recv_timeout(Duration::from_millis(100)) {
            Ok(Some(outcome)) => {
                if let Some(record) = outcome.record() {
                    serde_json::to_writer(&mut out, &record)?;
                    out.write_all(b"\n")?;
                    rows += 1;
                }
            }
            Ok(None) => continue,
            Err(BusError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }
    out.flush()?;
    if frames.missed() > 0 {
        warn!("frame logger fell behind and lost {} frames", frames.missed());
    }
    debug!("{} frame rows written to {}", rows, path.display());
    Ok(rows)
}

fn write_json<V: serde::Serialize>(path: PathBuf, value: &V) -> Result<()> {
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("failed to write {}", path.display()))
}
