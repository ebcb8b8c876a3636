use crate::error::BusError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Lossless, ordered event delivery. Channels are unbounded, so publishing
/// never waits on a subscriber.
pub struct EventFanout<T> {
    senders: Mutex<Vec<Sender<T>>>,
    closed: AtomicBool,
}

impl<T: Clone + Send> EventFanout<T> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribers only see events published after they subscribed.
    pub fn subscribe(&self) -> EventStream<T> {
        let (tx, rx) = unbounded();
        let mut senders = self.senders.lock();
        if !self.closed.load(Ordering::Acquire) {
            senders.push(tx);
        }
        EventStream { rx }
    }

    pub fn publish(&self, event: T) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        senders.len()
    }

    pub fn close(&self) {
        let mut senders = self.senders.lock();
        self.closed.store(true, Ordering::Release);
        senders.clear();
    }
}

impl<T: Clone + Send> Default for EventFanout<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventStream<T> {
    rx: Receiver<T>,
}

impl<T> EventStream<T> {
    /// `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, BusError> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Ok(Some(v)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }

    pub fn try_recv(&self) -> Result<Option<T>, BusError> {
        match self.rx.try_recv() {
            Ok(v) => Ok(Some(v)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }

    /// Blocks until the next event; ends when the fan-out is closed.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.iter()
    }
}
