use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic clock shared by the frame pipeline and the button listener.
///
/// Clones share the epoch, so timestamps taken on different threads are
/// comparable. Interval history is per instance.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn stream_stats(&self) -> StreamStats;
}

/// Inter-frame interval statistics of the marker stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub samples: usize,
    pub average_interval_ns: f64,
    pub jitter_ns: f64,
    pub min_interval_ns: f64,
    pub max_interval_ns: f64,
    pub effective_rate_hz: f64,
}

/// Sliding window of recent intervals.
#[derive(Debug, Clone)]
pub struct IntervalWindow {
    intervals: VecDeque<Duration>,
    max_samples: usize,
}

impl IntervalWindow {
    pub fn new(max_samples: usize) -> Self {
        Self {
            intervals: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn push(&mut self, d: Duration) {
        if self.intervals.len() >= self.max_samples {
            self.intervals.pop_front();
        }
        self.intervals.push_back(d);
    }

    pub fn stats(&self) -> StreamStats {
        if self.intervals.is_empty() {
            return StreamStats::default();
        }
        let times: Vec<f64> = self
            .intervals
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        StreamStats {
            samples: times.len(),
            average_interval_ns: avg,
            jitter_ns: var.sqrt(),
            min_interval_ns: min,
            max_interval_ns: max,
            effective_rate_hz: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: IntervalWindow,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frame_times.push(d);
    }
    fn stream_stats(&self) -> StreamStats {
        self.frame_times.stats()
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: IntervalWindow::new(1000),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer driven by hand, for deterministic tests and offline replay.
/// `sleep` advances the shared clock instead of blocking.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frame_times: IntervalWindow,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
            frame_times: IntervalWindow::new(1000),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        self.frame_times.push(d);
    }
    fn stream_stats(&self) -> StreamStats {
        self.frame_times.stats()
    }
}
