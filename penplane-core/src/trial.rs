use crate::touch::TouchSample;
use serde::{Deserialize, Serialize};

/// Which half of the display the active target sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    #[default]
    Right,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub fn flipped(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Closed interval of local `x` covered by the target, mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetBounds {
    pub low_mm: f64,
    pub high_mm: f64,
}

impl TargetBounds {
    pub fn contains(&self, x: f64) -> bool {
        self.low_mm <= x && x <= self.high_mm
    }

    pub fn width_mm(&self) -> f64 {
        self.high_mm - self.low_mm
    }
}

/// An accepted outside-to-inside crossing of the active target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub frame_number: u64,
    pub timestamp_ns: u64,
    /// 1-based count of accepted triggers, this one included.
    pub index: usize,
    pub side: Side,
    pub bounds: TargetBounds,
    pub x_local: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickSource {
    Button,
    Trigger,
}

/// A press or trigger pinned to the frame that was current when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub frame_number: u64,
    pub timestamp_ns: u64,
    pub source: ClickSource,
    pub sample: Option<TouchSample>,
}

/// What the actuator driver should do; waveform generation is its business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCommand {
    FireBurst,
    StartContinuous,
    StopContinuous,
}
