use crate::clicks::{ClickLedger, FrameCursor, FrameMark};
use crate::config::{ConfigError, ExperimentConfig};
use crate::pipeline::{FrameCounters, TouchPipeline};
use penplane_bus::{BusError, FrameBus};
use penplane_core::{
    FrameOutcome, MarkerSource, PipelineEvent, SessionEnd, SessionPhase, SourceError,
};
use penplane_timing::{StreamStats, Timer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub type PipelineBus = FrameBus<FrameOutcome, PipelineEvent, ExperimentConfig>;

/// Why a session was asked to end early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Requested,
    /// A side feed (the button feed) ended.
    Disconnected,
}

const RUNNING: u8 = 0;
const REQUESTED: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Cooperative stop request shared between the runner and its owner. The
/// first cause raised wins.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicU8>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn raise(&self, code: u8) -> bool {
        self.0
            .compare_exchange(RUNNING, code, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true only for the call that raised the signal.
    pub fn stop(&self) -> bool {
        self.raise(REQUESTED)
    }

    /// Like [`StopSignal::stop`], but the session is reported as disconnected.
    pub fn disconnect(&self) -> bool {
        self.raise(DISCONNECTED)
    }

    pub fn cause(&self) -> Option<StopCause> {
        match self.0.load(Ordering::Acquire) {
            RUNNING => None,
            DISCONNECTED => Some(StopCause::Disconnected),
            _ => Some(StopCause::Requested),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cause().is_some()
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("configuration was not received: {0}")]
    ConfigNotReceived(#[source] BusError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub config_timeout: Duration,
    /// Longest single wait on the marker source before re-checking the stop
    /// signal.
    pub poll_interval: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            config_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub phase: SessionPhase,
    pub end: SessionEnd,
    pub counters: FrameCounters,
    pub stream: StreamStats,
}

/// Drives a [`TouchPipeline`] from a marker source on its own thread and
/// publishes every outcome to the bus.
pub struct PipelineRunner<S, T>
where
    S: MarkerSource,
    T: Timer<Timestamp = u64>,
{
    bus: Arc<PipelineBus>,
    source: S,
    timer: T,
    stop: StopSignal,
    options: RunnerOptions,
    cursor: Option<FrameCursor>,
    ledger: Option<ClickLedger>,
    phase: SessionPhase,
}

impl<S, T> PipelineRunner<S, T>
where
    S: MarkerSource + 'static,
    T: Timer<Timestamp = u64> + 'static,
{
    pub fn new(bus: Arc<PipelineBus>, source: S, timer: T, options: RunnerOptions) -> Self {
        Self {
            bus,
            source,
            timer,
            stop: StopSignal::new(),
            options,
            cursor: None,
            ledger: None,
            phase: SessionPhase::default(),
        }
    }

    /// Frames are marked on `cursor` and triggers appended to `ledger` so a
    /// button listener can correlate presses.
    pub fn with_clicks(mut self, cursor: FrameCursor, ledger: ClickLedger) -> Self {
        self.cursor = Some(cursor);
        self.ledger = Some(ledger);
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<SessionReport, RunnerError>>> {
        thread::Builder::new()
            .name("touch-pipeline".into())
            .spawn(move || self.run())
    }

    /// Waits for the configuration, streams until completion, stop or
    /// disconnect, and always closes the bus before returning.
    pub fn run(mut self) -> Result<SessionReport, RunnerError> {
        let result = self.run_session();
        if result.is_err() {
            self.phase = self.phase.abort();
        }
        self.bus.close();
        result
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            self.phase = next;
            info!("session phase: {:?}", self.phase);
        }
    }

    fn run_session(&mut self) -> Result<SessionReport, RunnerError> {
        let config = self
            .bus
            .wait_config(self.options.config_timeout)
            .map_err(RunnerError::ConfigNotReceived)?;
        config.validate()?;
        info!(
            "configuration received: participant {} | W {} px, D {} px, ID {:.2} bits | {} trials",
            config.participant_id,
            config.target_width_px(),
            config.target_distance_px(),
            config.index_of_difficulty(),
            config.trial_count
        );
        self.advance();

        let mut pipeline = TouchPipeline::new(&config, self.timer.clone());
        self.advance();

        let mut last_frame = 0;
        let end = loop {
            if let Some(cause) = self.stop.cause() {
                let triggers = pipeline.counters().triggers;
                let expected = config.trial_count;
                break match cause {
                    StopCause::Requested => SessionEnd::Stopped { triggers, expected },
                    StopCause::Disconnected => {
                        warn!("side feed disconnected, ending the session");
                        SessionEnd::Disconnected { triggers, expected }
                    }
                };
            }
            let frame = match self.source.next_frame(self.options.poll_interval) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(SourceError::Malformed { line, message }) => {
                    warn!("dropping malformed frame on line {}: {}", line, message);
                    continue;
                }
                Err(err) => {
                    if let SourceError::Io(e) = &err {
                        error!("marker source failed: {}", e);
                    }
                    warn!("marker stream ended: {}", err);
                    break SessionEnd::Disconnected {
                        triggers: pipeline.counters().triggers,
                        expected: config.trial_count,
                    };
                }
            };

            let outcome = pipeline.process(&frame);
            last_frame = outcome.frame_number;
            self.note_clicks(&outcome);
            let events = PipelineEvent::from_outcome(&outcome);
            self.bus.publish_frame(outcome);
            for event in events {
                self.bus.publish_event(event);
            }
            if outcome.complete {
                break SessionEnd::Completed {
                    triggers: pipeline.counters().triggers,
                };
            }
        };

        if let Some(command) = pipeline.finish() {
            self.bus.publish_event(PipelineEvent::Feedback {
                frame: last_frame,
                command,
            });
        }
        self.bus.publish_event(PipelineEvent::Ended(end));

        if end.is_complete() {
            self.advance();
        } else {
            warn!(
                "session ended early: {} of {} triggers",
                end.triggers(),
                config.trial_count
            );
            self.phase = self.phase.abort();
        }

        let counters = pipeline.counters();
        let stream = pipeline.timer.stream_stats();
        info!(
            "stream: {} frames ({} valid, {} invalid, {} degenerate, {} out of order) | {:.1} Hz, mean {:.3} ms, jitter {:.3} ms",
            counters.processed,
            counters.valid,
            counters.invalid,
            counters.degenerate,
            counters.out_of_order,
            stream.effective_rate_hz,
            stream.average_interval_ns / 1_000_000.0,
            stream.jitter_ns / 1_000_000.0
        );

        Ok(SessionReport {
            phase: self.phase,
            end,
            counters,
            stream,
        })
    }

    fn note_clicks(&self, outcome: &FrameOutcome) {
        if let Some(cursor) = &self.cursor {
            cursor.mark(FrameMark {
                frame_number: outcome.frame_number,
                timestamp_ns: outcome.timestamp_ns,
                sample: outcome.result.sample().copied(),
            });
        }
        if let (Some(ledger), Some(trigger)) = (&self.ledger, &outcome.trigger) {
            ledger.record_trigger(trigger, outcome.result.sample().copied());
        }
    }
}
