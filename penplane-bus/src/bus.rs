use crate::error::BusError;
use crate::fanout::{EventFanout, EventStream};
use crate::latest::{LatestBroadcast, Subscription};
use crate::retained::Retained;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Per-frame data `F`, discrete events `E` and the one-shot configuration `C`.
pub struct FrameBus<F, E, C> {
    frames: LatestBroadcast<F>,
    events: EventFanout<E>,
    config: Retained<C>,
    closed: AtomicBool,
}

impl<F, E, C> FrameBus<F, E, C>
where
    F: Clone + Send,
    E: Clone + Send,
{
    /// `frame_depth` is how many frames a subscriber may lag before its
    /// oldest frames are dropped.
    pub fn new(frame_depth: usize) -> Self {
        Self {
            frames: LatestBroadcast::new(frame_depth),
            events: EventFanout::new(),
            config: Retained::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn publish_config(&self, config: C) -> Result<Arc<C>, BusError> {
        self.config.set(config)
    }

    pub fn config(&self) -> Option<Arc<C>> {
        self.config.get()
    }

    pub fn wait_config(&self, timeout: Duration) -> Result<Arc<C>, BusError> {
        self.config.wait(timeout)
    }

    pub fn publish_frame(&self, frame: F) -> usize {
        self.frames.publish(frame)
    }

    pub fn publish_event(&self, event: E) -> usize {
        self.events.publish(event)
    }

    pub fn subscribe_frames(&self) -> Subscription<F> {
        self.frames.subscribe()
    }

    pub fn subscribe_events(&self) -> EventStream<E> {
        self.events.subscribe()
    }

    /// Idempotent; returns true on the call that actually closed the bus.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.frames.close();
        self.events.close();
        debug!("frame bus closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
