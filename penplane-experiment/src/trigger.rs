use crate::target::TargetModel;
use penplane_core::{Side, TargetBounds, TouchSample, TriggerEvent};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    /// Nothing classified yet.
    #[default]
    Idle,
    Outside,
    Inside,
}

/// Edge-triggered detection of target entries.
///
/// A trigger fires on the frame the pen goes from not-inside to inside the
/// active target, however long it then dwells there. Each trigger moves the
/// target to the other side. After `trial_count` triggers the machine stops
/// evaluating.
#[derive(Debug, Clone)]
pub struct TriggerStateMachine {
    state: TriggerState,
    target: TargetModel,
    accepted: usize,
    trial_count: usize,
}

impl TriggerStateMachine {
    pub fn new(target: TargetModel, trial_count: usize) -> Self {
        Self {
            state: TriggerState::Idle,
            target,
            accepted: 0,
            trial_count,
        }
    }

    /// Call once per valid frame. Invalid frames are simply not fed in, which
    /// leaves both the state and the trial progress untouched.
    pub fn evaluate(&mut self, sample: &TouchSample, timestamp_ns: u64) -> Option<TriggerEvent> {
        if self.is_complete() {
            return None;
        }
        let bounds = self.target.bounds();
        let inside = sample.status.is_touching() && bounds.contains(sample.local.x);

        match (self.state, inside) {
            (TriggerState::Inside, true) => None,
            (_, false) => {
                self.state = TriggerState::Outside;
                None
            }
            (TriggerState::Idle | TriggerState::Outside, true) => {
                self.accepted += 1;
                let event = TriggerEvent {
                    frame_number: sample.frame_number,
                    timestamp_ns,
                    index: self.accepted,
                    side: self.target.side(),
                    bounds,
                    x_local: sample.local.x,
                };
                info!(
                    "trigger {}/{} at frame {} | x_local {:.2} mm | target {:.2}..{:.2} mm",
                    self.accepted,
                    self.trial_count,
                    sample.frame_number,
                    sample.local.x,
                    bounds.low_mm,
                    bounds.high_mm
                );
                self.target.advance();
                self.state = TriggerState::Inside;
                Some(event)
            }
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    pub fn is_complete(&self) -> bool {
        self.accepted >= self.trial_count
    }

    pub fn target_bounds(&self) -> TargetBounds {
        self.target.bounds()
    }

    pub fn target_side(&self) -> Side {
        self.target.side()
    }

    /// Copy of the target for readers outside the pipeline thread.
    pub fn target_snapshot(&self) -> TargetModel {
        self.target.clone()
    }
}
