use crate::error::{FrameError, InvalidReason};
use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One numbered frame of labeled 3-D marker positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerFrame {
    #[serde(rename = "frame")]
    pub frame_number: u64,
    pub markers: Vec<Vec3>,
}

impl MarkerFrame {
    pub fn new(frame_number: u64, markers: Vec<Vec3>) -> Self {
        Self {
            frame_number,
            markers,
        }
    }
}

/// Which marker indices are the display corners and which is the pen tip.
///
/// Corners are listed top-right, bottom-right, bottom-left, top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLayout {
    pub corners: [usize; 4],
    pub pen_tip: usize,
}

impl Default for MarkerLayout {
    fn default() -> Self {
        Self {
            corners: [0, 1, 2, 3],
            pen_tip: 8,
        }
    }
}

/// Required markers of a frame, validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledMarkers {
    pub corners: [Vec3; 4],
    pub pen_tip: Vec3,
}

impl MarkerLayout {
    /// Four corners followed directly by the pen tip.
    pub const COMPACT: MarkerLayout = MarkerLayout {
        corners: [0, 1, 2, 3],
        pen_tip: 4,
    };

    pub fn min_markers(&self) -> usize {
        self.corners
            .iter()
            .copied()
            .chain(std::iter::once(self.pen_tip))
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn is_distinct(&self) -> bool {
        let mut all = [
            self.corners[0],
            self.corners[1],
            self.corners[2],
            self.corners[3],
            self.pen_tip,
        ];
        all.sort_unstable();
        all.windows(2).all(|w| w[0] != w[1])
    }

    pub fn extract(&self, frame: &MarkerFrame) -> Result<LabeledMarkers, FrameError> {
        let required = self.min_markers();
        if frame.markers.len() < required {
            return Err(FrameError::InvalidFrame {
                frame: frame.frame_number,
                reason: InvalidReason::TooFewMarkers {
                    required,
                    found: frame.markers.len(),
                },
            });
        }

        let pick = |index: usize| -> Result<Vec3, FrameError> {
            let p = frame.markers[index];
            let reason = if !p.is_finite() {
                InvalidReason::NonFiniteMarker { index }
            } else if p.is_zero() {
                InvalidReason::ZeroMarker { index }
            } else {
                return Ok(p);
            };
            Err(FrameError::InvalidFrame {
                frame: frame.frame_number,
                reason,
            })
        };

        Ok(LabeledMarkers {
            corners: [
                pick(self.corners[0])?,
                pick(self.corners[1])?,
                pick(self.corners[2])?,
                pick(self.corners[3])?,
            ],
            pen_tip: pick(self.pen_tip)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream feed disconnected")]
    Disconnected,
    #[error("malformed frame on line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stream of marker frames.
pub trait MarkerSource: Send {
    /// Waits up to `timeout` for the next frame. `Ok(None)` means nothing
    /// arrived yet; [`SourceError::Disconnected`] ends the stream.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<MarkerFrame>, SourceError>;
}
