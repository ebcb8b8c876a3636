pub mod error;
pub mod geometry;
pub mod marker;
pub mod outcome;
pub mod phase;
pub mod touch;
pub mod trial;

pub use error::{FrameError, FrameErrorKind, InvalidReason};
pub use geometry::{
    CenteredBasis, DisplayAxes, GeometryError, LocalExtent, LocalPoint, Measurement, Projection,
    ProjectionConvention, ReferenceEdge, ScreenPlane, Vec3, measure,
};
pub use marker::{LabeledMarkers, MarkerFrame, MarkerLayout, MarkerSource, SourceError};
pub use outcome::{FrameOutcome, FrameRecord, FrameResult, PipelineEvent, SessionEnd};
pub use phase::SessionPhase;
pub use touch::{TouchClassifier, TouchSample, TouchStatus};
pub use trial::{ClickRecord, ClickSource, FeedbackCommand, Side, TargetBounds, TriggerEvent};
