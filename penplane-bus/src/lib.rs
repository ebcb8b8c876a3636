//! In-process delivery of pipeline output to independent consumers.
//!
//! Three primitives, none of which lets a consumer stall the producer:
//! [`LatestBroadcast`] for per-frame data (lossy, newest wins),
//! [`EventFanout`] for discrete events (lossless, unbounded) and
//! [`Retained`] for one-shot values such as the session configuration.

pub mod bus;
pub mod error;
pub mod fanout;
pub mod latest;
pub mod retained;

pub use bus::FrameBus;
pub use error::BusError;
pub use fanout::{EventFanout, EventStream};
pub use latest::{LatestBroadcast, Subscription};
pub use retained::Retained;
