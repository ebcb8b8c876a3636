use crate::config::ExperimentConfig;
use crate::feedback::FeedbackController;
use crate::target::TargetModel;
use crate::trigger::TriggerStateMachine;
use penplane_core::{
    FrameError, FrameErrorKind, FrameOutcome, FrameResult, MarkerFrame, MarkerLayout,
    ProjectionConvention, TouchClassifier, TouchSample, measure,
};
use penplane_timing::Timer;
use std::time::Duration;
use tracing::{debug, warn};

/// Skipped frames are logged at `warn` once per run of consecutive skips and
/// then every this many frames.
const SKIP_LOG_EVERY: u64 = 100;

/// Per-stream frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub processed: u64,
    pub valid: u64,
    pub invalid: u64,
    pub degenerate: u64,
    pub out_of_order: u64,
    pub touching: u64,
    pub triggers: usize,
}

impl FrameCounters {
    pub fn skipped(&self) -> u64 {
        self.invalid + self.degenerate + self.out_of_order
    }

    fn note_skip(&mut self, kind: FrameErrorKind) {
        match kind {
            FrameErrorKind::InvalidFrame => self.invalid += 1,
            FrameErrorKind::DegenerateGeometry => self.degenerate += 1,
            FrameErrorKind::OutOfOrder => self.out_of_order += 1,
        }
    }
}

/// Single-threaded, per-frame processing: marker extraction, plane fit,
/// touch classification, trigger evaluation and feedback.
///
/// Owns all mutable experiment state. Frames are processed strictly one
/// after the other.
pub struct TouchPipeline<T>
where
    T: Timer<Timestamp = u64>,
{
    pub timer: T,
    layout: MarkerLayout,
    projection: ProjectionConvention,
    classifier: TouchClassifier,
    trigger: TriggerStateMachine,
    feedback: FeedbackController,
    last_frame: Option<u64>,
    last_frame_at: Option<u64>,
    skip_run: u64,
    counters: FrameCounters,
}

impl<T> TouchPipeline<T>
where
    T: Timer<Timestamp = u64>,
{
    pub fn new(config: &ExperimentConfig, timer: T) -> Self {
        Self {
            timer,
            layout: config.layout,
            projection: config.projection,
            classifier: TouchClassifier::new(config.touch_threshold_mm),
            trigger: TriggerStateMachine::new(TargetModel::from_config(config), config.trial_count),
            feedback: FeedbackController::from_config(config),
            last_frame: None,
            last_frame_at: None,
            skip_run: 0,
            counters: FrameCounters::default(),
        }
    }

    pub fn process(&mut self, frame: &MarkerFrame) -> FrameOutcome {
        let now = self.timer.now();
        if let Some(prev) = self.last_frame_at {
            self.timer
                .record_frame(Duration::from_nanos(now.saturating_sub(prev)));
        }
        self.last_frame_at = Some(now);
        self.counters.processed += 1;

        let was_complete = self.trigger.is_complete();
        let (result, trigger, feedback) = match self.classify(frame) {
            Ok(sample) => {
                self.skip_run = 0;
                self.counters.valid += 1;
                if sample.status.is_touching() {
                    self.counters.touching += 1;
                }
                let trigger = self.trigger.evaluate(&sample, now);
                if trigger.is_some() {
                    self.counters.triggers += 1;
                }
                let contact = sample.status.is_touching().then_some(sample.local.x);
                let feedback = self.feedback.observe(contact);
                (FrameResult::Sample(sample), trigger, feedback)
            }
            Err(err) => {
                self.note_skip(&err);
                self.feedback.position_unknown();
                (FrameResult::Skipped(err), None, None)
            }
        };

        FrameOutcome {
            frame_number: frame.frame_number,
            timestamp_ns: now,
            result,
            trigger,
            feedback,
            target: self.trigger.target_bounds(),
            complete: !was_complete && self.trigger.is_complete(),
        }
    }

    fn classify(&mut self, frame: &MarkerFrame) -> Result<TouchSample, FrameError> {
        if let Some(previous) = self.last_frame {
            if frame.frame_number <= previous {
                return Err(FrameError::OutOfOrder {
                    frame: frame.frame_number,
                    previous,
                });
            }
        }
        self.last_frame = Some(frame.frame_number);

        let markers = self.layout.extract(frame)?;
        let m = measure(markers.corners, markers.pen_tip, &self.projection).map_err(|source| {
            FrameError::DegenerateGeometry {
                frame: frame.frame_number,
                source,
            }
        })?;
        Ok(self.classifier.sample(frame.frame_number, markers.pen_tip, &m))
    }

    fn note_skip(&mut self, err: &FrameError) {
        self.counters.note_skip(err.kind());
        if self.skip_run % SKIP_LOG_EVERY == 0 {
            warn!("skipping frame: {} ({} skipped so far)", err, self.counters.skipped());
        } else {
            debug!("skipping frame: {}", err);
        }
        self.skip_run += 1;
    }

    /// Stops any running actuator; call once when the stream ends.
    pub fn finish(&mut self) -> Option<penplane_core::FeedbackCommand> {
        self.feedback.finish()
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    pub fn trigger(&self) -> &TriggerStateMachine {
        &self.trigger
    }

    pub fn is_complete(&self) -> bool {
        self.trigger.is_complete()
    }
}
