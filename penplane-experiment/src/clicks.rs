//! Button presses and their correlation with marker frames.
//!
//! The button feed runs on its own thread and never sees target or geometry
//! state. It only reads the [`FrameCursor`] and appends to the
//! [`ClickLedger`].

use crate::runner::StopSignal;
use parking_lot::{Mutex, RwLock};
use penplane_core::{ClickRecord, ClickSource, SourceError, TouchSample, TriggerEvent};
use penplane_timing::Timer;
use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMark {
    pub frame_number: u64,
    pub timestamp_ns: u64,
    pub sample: Option<TouchSample>,
}

/// Bounded history of recently processed frames, written by the pipeline
/// thread and read by the button listener.
#[derive(Debug, Clone)]
pub struct FrameCursor {
    marks: Arc<RwLock<VecDeque<FrameMark>>>,
    capacity: usize,
}

impl FrameCursor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            marks: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends `mark` unless it is not newer than the last marked frame.
    /// Returns whether it was kept.
    pub fn mark(&self, mark: FrameMark) -> bool {
        let mut marks = self.marks.write();
        if marks.back().is_some_and(|last| mark.frame_number <= last.frame_number) {
            debug!("frame {} is behind the cursor, not marked", mark.frame_number);
            return false;
        }
        if marks.len() >= self.capacity {
            marks.pop_front();
        }
        marks.push_back(mark);
        true
    }

    /// Highest frame processed at or before `press_ns`.
    pub fn correlate(&self, press_ns: u64) -> Option<FrameMark> {
        let marks = self.marks.read();
        // Frame numbers only grow along the deque, so scan from the newest.
        marks
            .iter()
            .rev()
            .find(|m| m.timestamp_ns <= press_ns)
            .copied()
    }

    pub fn latest(&self) -> Option<FrameMark> {
        self.marks.read().back().copied()
    }
}

/// Append-only set of click records keyed by frame number.
#[derive(Debug, Clone, Default)]
pub struct ClickLedger {
    inner: Arc<Mutex<BTreeMap<u64, Vec<ClickRecord>>>>,
}

impl ClickLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: ClickRecord) {
        self.inner
            .lock()
            .entry(record.frame_number)
            .or_default()
            .push(record);
    }

    pub fn record_trigger(&self, trigger: &TriggerEvent, sample: Option<TouchSample>) {
        self.record(ClickRecord {
            frame_number: trigger.frame_number,
            timestamp_ns: trigger.timestamp_ns,
            source: ClickSource::Trigger,
            sample,
        });
    }

    pub fn is_clicked(&self, frame_number: u64) -> bool {
        self.inner.lock().contains_key(&frame_number)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn count(&self, source: ClickSource) -> usize {
        self.inner
            .lock()
            .values()
            .flatten()
            .filter(|r| r.source == source)
            .count()
    }

    /// All records in frame order.
    pub fn snapshot(&self) -> Vec<ClickRecord> {
        self.inner.lock().values().flatten().copied().collect()
    }
}

/// `"1"` is a press, anything else is noise.
pub fn is_press(line: &str) -> bool {
    line.trim() == "1"
}

/// Listens to a line-oriented button feed on a dedicated thread.
pub struct ButtonListener<T>
where
    T: Timer<Timestamp = u64> + 'static,
{
    timer: T,
    cursor: FrameCursor,
    ledger: ClickLedger,
    stop: Option<StopSignal>,
}

impl<T> ButtonListener<T>
where
    T: Timer<Timestamp = u64> + 'static,
{
    pub fn new(timer: T, cursor: FrameCursor, ledger: ClickLedger) -> Self {
        Self {
            timer,
            cursor,
            ledger,
            stop: None,
        }
    }

    /// When the feed ends, `stop` is raised as a disconnect.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Handles one line of the feed; returns the record if it was a press
    /// that could be placed on a frame.
    pub fn handle_line(&self, line: &str) -> Option<ClickRecord> {
        if !is_press(line) {
            debug!("ignoring button line {:?}", line);
            return None;
        }
        let press_ns = self.timer.now();
        let Some(mark) = self.cursor.correlate(press_ns) else {
            warn!("button press at {} ns before any frame, dropped", press_ns);
            return None;
        };
        let record = ClickRecord {
            frame_number: mark.frame_number,
            timestamp_ns: press_ns,
            source: ClickSource::Button,
            sample: mark.sample,
        };
        self.ledger.record(record);
        info!("button press -> frame {}", mark.frame_number);
        Some(record)
    }

    /// Reads until the feed ends. A clean end of input is still reported as
    /// [`SourceError::Disconnected`]: the feed is not expected to close.
    pub fn run<R: BufRead>(&self, reader: R) -> Result<usize, SourceError> {
        let err = match self.read_presses(reader) {
            Ok(presses) => {
                warn!("button feed closed after {} presses", presses);
                SourceError::Disconnected
            }
            Err(err) => {
                error!("button feed failed: {}", err);
                err
            }
        };
        if let Some(stop) = &self.stop {
            stop.disconnect();
        }
        Err(err)
    }

    fn read_presses<R: BufRead>(&self, reader: R) -> Result<usize, SourceError> {
        let mut presses = 0;
        for line in reader.lines() {
            if self.handle_line(&line?).is_some() {
                presses += 1;
            }
        }
        Ok(presses)
    }

    pub fn spawn<R>(self, reader: R) -> std::io::Result<JoinHandle<Result<usize, SourceError>>>
    where
        R: BufRead + Send + 'static,
    {
        thread::Builder::new()
            .name("button-listener".into())
            .spawn(move || self.run(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penplane_core::{LocalPoint, Side, TargetBounds, TouchStatus, Vec3};
    use penplane_timing::ManualTimer;
    use std::io::Cursor;

    fn mark(frame: u64, ts: u64) -> FrameMark {
        FrameMark {
            frame_number: frame,
            timestamp_ns: ts,
            sample: None,
        }
    }

    #[test]
    fn press_maps_to_last_frame_at_or_before_it() {
        let cursor = FrameCursor::new(16);
        cursor.mark(mark(1, 100));
        cursor.mark(mark(2, 200));
        cursor.mark(mark(3, 300));
        assert_eq!(cursor.correlate(250).unwrap().frame_number, 2);
        assert_eq!(cursor.correlate(300).unwrap().frame_number, 3);
        assert_eq!(cursor.correlate(10_000).unwrap().frame_number, 3);
        assert!(cursor.correlate(99).is_none());
    }

    #[test]
    fn late_frame_does_not_shadow_a_newer_one() {
        let cursor = FrameCursor::new(16);
        let sample = TouchSample {
            frame_number: 10,
            pen_tip: Vec3::new(10.0, 5.0, 1.0),
            distance: 1.0,
            local: LocalPoint { x: 10.0, y: 5.0 },
            status: TouchStatus::Touching,
        };
        assert!(cursor.mark(FrameMark {
            frame_number: 10,
            timestamp_ns: 100,
            sample: Some(sample),
        }));
        assert!(!cursor.mark(mark(9, 110)));
        assert!(!cursor.mark(mark(10, 120)));

        let hit = cursor.correlate(200).unwrap();
        assert_eq!(hit.frame_number, 10);
        assert_eq!(hit.sample, Some(sample));
        assert_eq!(cursor.latest().unwrap().frame_number, 10);
    }

    #[test]
    fn cursor_is_bounded() {
        let cursor = FrameCursor::new(2);
        for n in 1..=5 {
            cursor.mark(mark(n, n * 10));
        }
        assert!(cursor.correlate(25).is_none());
        assert_eq!(cursor.correlate(45).unwrap().frame_number, 4);
        assert_eq!(cursor.latest().unwrap().frame_number, 5);
    }

    #[test]
    fn ledger_keeps_every_record() {
        let ledger = ClickLedger::new();
        let trigger = TriggerEvent {
            frame_number: 7,
            timestamp_ns: 70,
            index: 1,
            side: Side::Right,
            bounds: TargetBounds {
                low_mm: 1.0,
                high_mm: 2.0,
            },
            x_local: 1.5,
        };
        ledger.record_trigger(&trigger, None);
        ledger.record(ClickRecord {
            frame_number: 7,
            timestamp_ns: 71,
            source: ClickSource::Button,
            sample: None,
        });
        assert!(ledger.is_clicked(7));
        assert!(!ledger.is_clicked(8));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.count(ClickSource::Trigger), 1);
    }

    #[test]
    fn listener_reads_presses_until_disconnect() {
        let timer = ManualTimer::new();
        let cursor = FrameCursor::new(8);
        let ledger = ClickLedger::new();
        timer.set(1_000);
        cursor.mark(mark(41, 900));
        cursor.mark(mark(42, 1_000));

        let listener = ButtonListener::new(timer.clone(), cursor, ledger.clone());
        let feed = Cursor::new("0\n1\nnoise\n 1 \n\n");
        let result = listener.run(feed);
        assert!(matches!(result, Err(SourceError::Disconnected)));
        assert_eq!(ledger.count(ClickSource::Button), 2);
        assert!(ledger.is_clicked(42));
        assert!(!ledger.is_clicked(41));
    }

    #[test]
    fn closed_feed_raises_a_disconnect() {
        let stop = StopSignal::new();
        let listener = ButtonListener::new(ManualTimer::new(), FrameCursor::new(4), ClickLedger::new())
            .with_stop(stop.clone());
        assert!(listener.run(Cursor::new("0\n")).is_err());
        assert_eq!(stop.cause(), Some(crate::runner::StopCause::Disconnected));
    }

    #[test]
    fn press_before_first_frame_is_dropped() {
        let listener = ButtonListener::new(ManualTimer::new(), FrameCursor::new(4), ClickLedger::new());
        assert!(listener.handle_line("1").is_none());
        assert!(listener.ledger.is_empty());
    }
}
