use crate::error::FrameError;
use crate::touch::{TouchSample, TouchStatus};
use crate::trial::{FeedbackCommand, TargetBounds, TriggerEvent};
use serde::{Deserialize, Serialize};

/// Result of a single frame. Skipped frames travel the same path as valid
/// ones so consumers never special-case them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameResult {
    Sample(TouchSample),
    Skipped(FrameError),
}

impl FrameResult {
    pub fn sample(&self) -> Option<&TouchSample> {
        match self {
            FrameResult::Sample(s) => Some(s),
            FrameResult::Skipped(_) => None,
        }
    }
}

/// Everything the pipeline produced for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    pub frame_number: u64,
    pub timestamp_ns: u64,
    pub result: FrameResult,
    pub trigger: Option<TriggerEvent>,
    pub feedback: Option<FeedbackCommand>,
    /// Target as it stands after this frame.
    pub target: TargetBounds,
    pub complete: bool,
}

impl FrameOutcome {
    pub fn record(&self) -> Option<FrameRecord> {
        self.result.sample().map(|s| FrameRecord {
            frame: s.frame_number,
            x_local: s.local.x,
            y_local: s.local.y,
            distance: s.distance,
            status: s.status,
            target_low_mm: self.target.low_mm,
            target_high_mm: self.target.high_mm,
        })
    }
}

/// Flat per-frame row for loggers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub x_local: f64,
    pub y_local: f64,
    pub distance: f64,
    pub status: TouchStatus,
    pub target_low_mm: f64,
    pub target_high_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SessionEnd {
    /// All configured triggers were accepted.
    Completed { triggers: usize },
    /// Stopped on request before completion.
    Stopped { triggers: usize, expected: usize },
    /// The marker stream or the button feed ended before completion.
    Disconnected { triggers: usize, expected: usize },
}

impl SessionEnd {
    pub fn is_complete(&self) -> bool {
        matches!(self, SessionEnd::Completed { .. })
    }

    pub fn triggers(&self) -> usize {
        match *self {
            SessionEnd::Completed { triggers }
            | SessionEnd::Stopped { triggers, .. }
            | SessionEnd::Disconnected { triggers, .. } => triggers,
        }
    }
}

/// Discrete, ordered events delivered to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineEvent {
    Trigger(TriggerEvent),
    Feedback { frame: u64, command: FeedbackCommand },
    TrialComplete { triggers: usize },
    Ended(SessionEnd),
}

impl PipelineEvent {
    /// Events carried by a frame outcome, in emission order.
    pub fn from_outcome(outcome: &FrameOutcome) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        if let Some(trigger) = outcome.trigger {
            events.push(PipelineEvent::Trigger(trigger));
        }
        if let Some(command) = outcome.feedback {
            events.push(PipelineEvent::Feedback {
                frame: outcome.frame_number,
                command,
            });
        }
        if outcome.complete {
            events.push(PipelineEvent::TrialComplete {
                triggers: outcome.trigger.map_or(0, |t| t.index),
            });
        }
        events
    }
}
