use crate::error::BusError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Write-once value that late readers still see.
///
/// Replaces "poll until the file appears": readers block on [`Retained::wait`]
/// with a deadline instead.
pub struct Retained<T> {
    slot: Mutex<Option<Arc<T>>>,
    ready: Condvar,
}

impl<T> Retained<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    pub fn set(&self, value: T) -> Result<Arc<T>, BusError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(BusError::AlreadySet);
        }
        let value = Arc::new(value);
        *slot = Some(Arc::clone(&value));
        self.ready.notify_all();
        Ok(value)
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().clone()
    }

    pub fn wait(&self, timeout: Duration) -> Result<Arc<T>, BusError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return Ok(Arc::clone(value));
            }
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.clone().ok_or(BusError::Timeout(timeout));
            }
        }
    }
}

impl<T> Default for Retained<T> {
    fn default() -> Self {
        Self::new()
    }
}
