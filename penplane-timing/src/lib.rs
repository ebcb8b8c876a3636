pub mod timer;

pub use timer::{HighPrecisionTimer, IntervalWindow, ManualTimer, StreamStats, Timer};
