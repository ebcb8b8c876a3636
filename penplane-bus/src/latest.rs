use crate::error::BusError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct SlotShared {
    dropped: AtomicU64,
}

struct Slot<T> {
    tx: Sender<T>,
    // producer-side handle used to evict the oldest queued value
    evict: Receiver<T>,
    shared: Arc<SlotShared>,
}

impl<T> Slot<T> {
    /// Returns false once the subscriber is gone.
    fn offer(&self, value: T) -> bool {
        if Arc::strong_count(&self.shared) == 1 {
            return false;
        }
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(value)) => {
                let _ = self.evict.try_recv();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                // a racing consumer may refill the slot; the new value is then lost
                !matches!(self.tx.try_send(value), Err(TrySendError::Disconnected(_)))
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// One-to-many broadcast where slow subscribers lose their oldest values.
pub struct LatestBroadcast<T> {
    slots: Mutex<Vec<Slot<T>>>,
    capacity: usize,
    closed: AtomicBool,
}

impl<T: Clone + Send> LatestBroadcast<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = bounded(self.capacity);
        let shared = Arc::new(SlotShared::default());
        // `closed` is only flipped under the slots lock
        let mut slots = self.slots.lock();
        if !self.closed.load(Ordering::Acquire) {
            slots.push(Slot {
                tx,
                evict: rx.clone(),
                shared: Arc::clone(&shared),
            });
        }
        drop(slots);
        Subscription { rx, shared }
    }

    /// Never blocks. Returns how many subscribers received the value.
    pub fn publish(&self, value: T) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| slot.offer(value.clone()));
        if slots.len() < before {
            debug!(removed = before - slots.len(), "frame subscribers left");
        }
        slots.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Drops all senders; subscribers drain what is queued and then see
    /// [`BusError::Closed`].
    pub fn close(&self) {
        let mut slots = self.slots.lock();
        self.closed.store(true, Ordering::Release);
        slots.clear();
    }
}

pub struct Subscription<T> {
    rx: Receiver<T>,
    shared: Arc<SlotShared>,
}

impl<T> Subscription<T> {
    /// `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, BusError> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Ok(Some(v)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }

    /// Drains the queue and keeps only the newest value.
    pub fn latest(&self) -> Result<Option<T>, BusError> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(v) => newest = Some(v),
                Err(TryRecvError::Empty) => return Ok(newest),
                Err(TryRecvError::Disconnected) => {
                    return if newest.is_some() {
                        Ok(newest)
                    } else {
                        Err(BusError::Closed)
                    };
                }
            }
        }
    }

    /// Values evicted before this subscriber read them.
    pub fn missed(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
