use crate::geometry::GeometryError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidReason {
    #[error("expected at least {required} markers, got {found}")]
    TooFewMarkers { required: usize, found: usize },
    #[error("marker {index} is the zero vector")]
    ZeroMarker { index: usize },
    #[error("marker {index} is not finite")]
    NonFiniteMarker { index: usize },
}

/// Why a frame produced no touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FrameError {
    #[error("frame {frame}: {reason}")]
    InvalidFrame { frame: u64, reason: InvalidReason },
    #[error("frame {frame}: {source}")]
    DegenerateGeometry {
        frame: u64,
        #[source]
        source: GeometryError,
    },
    #[error("frame {frame} does not follow frame {previous}")]
    OutOfOrder { frame: u64, previous: u64 },
}

/// Coarse classification of [`FrameError`] used for skip counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameErrorKind {
    InvalidFrame,
    DegenerateGeometry,
    OutOfOrder,
}

impl FrameError {
    pub fn frame(&self) -> u64 {
        match *self {
            FrameError::InvalidFrame { frame, .. }
            | FrameError::DegenerateGeometry { frame, .. }
            | FrameError::OutOfOrder { frame, .. } => frame,
        }
    }

    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::InvalidFrame { .. } => FrameErrorKind::InvalidFrame,
            FrameError::DegenerateGeometry { .. } => FrameErrorKind::DegenerateGeometry,
            FrameError::OutOfOrder { .. } => FrameErrorKind::OutOfOrder,
        }
    }
}
