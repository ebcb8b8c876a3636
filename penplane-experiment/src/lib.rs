pub mod clicks;
pub mod config;
pub mod feedback;
pub mod hysteresis;
pub mod pipeline;
pub mod runner;
pub mod source;
pub mod target;
pub mod trial;
pub mod trigger;

pub use clicks::{ButtonListener, ClickLedger, FrameCursor, FrameMark};
pub use config::{BinConfig, ConfigError, ExperimentConfig, FeedbackMode, OffsetConvention};
pub use feedback::FeedbackController;
pub use hysteresis::{BinChange, BinHysteresis};
pub use pipeline::{FrameCounters, TouchPipeline};
pub use runner::{
    PipelineBus, PipelineRunner, RunnerError, RunnerOptions, SessionReport, StopCause, StopSignal,
};
pub use source::ChannelSource;
pub use target::TargetModel;
pub use trial::{TrialLog, TrialRecord, TrialSummary};
pub use trigger::{TriggerState, TriggerStateMachine};
