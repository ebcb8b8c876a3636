use crate::config::ExperimentConfig;
use penplane_core::{SessionEnd, Side, TriggerEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fitts measures of one accepted trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub index: usize,
    pub frame: u64,
    pub side: Side,
    pub x_local_mm: f64,
    /// Movement time since the previous trigger (or session start), ms.
    pub movement_time_ms: f64,
    /// `D / MT`, px/ms.
    pub speed: f64,
    /// `ID / MT`, bits/s.
    pub throughput: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub participant_id: String,
    pub width_px: f64,
    pub distance_px: f64,
    pub index_of_difficulty: f64,
    pub expected_trials: usize,
    pub completed_trials: usize,
    pub complete: bool,
    /// Trials left out of the averages.
    pub excluded_trials: usize,
    pub mean_movement_time_ms: Option<f64>,
    pub mean_speed: Option<f64>,
    pub mean_throughput: Option<f64>,
    pub end: Option<SessionEnd>,
    pub trials: Vec<TrialRecord>,
}

/// Session context for one participant/condition: consumes trigger events in
/// order and keeps the Fitts measures.
#[derive(Debug, Clone)]
pub struct TrialLog {
    participant_id: String,
    width_px: f64,
    distance_px: f64,
    index_of_difficulty: f64,
    expected: usize,
    warmup: usize,
    last_ns: u64,
    trials: Vec<TrialRecord>,
    end: Option<SessionEnd>,
}

impl TrialLog {
    /// `start_ns` is the reference instant for the first movement time.
    pub fn new(config: &ExperimentConfig, start_ns: u64) -> Self {
        Self {
            participant_id: config.participant_id.clone(),
            width_px: config.target_width_px(),
            distance_px: config.target_distance_px(),
            index_of_difficulty: config.index_of_difficulty(),
            expected: config.trial_count,
            warmup: config.warmup_trials,
            last_ns: start_ns,
            trials: Vec::with_capacity(config.trial_count),
            end: None,
        }
    }

    pub fn record(&mut self, trigger: &TriggerEvent) -> TrialRecord {
        let mt = trigger.timestamp_ns.saturating_sub(self.last_ns) as f64 / 1_000_000.0;
        self.last_ns = trigger.timestamp_ns;
        let (speed, throughput) = if mt > 0.0 {
            (
                self.distance_px / mt,
                self.index_of_difficulty / (mt / 1000.0),
            )
        } else {
            (0.0, 0.0)
        };
        let record = TrialRecord {
            index: trigger.index,
            frame: trigger.frame_number,
            side: trigger.side,
            x_local_mm: trigger.x_local,
            movement_time_ms: mt,
            speed,
            throughput,
        };
        info!(
            "trial {}/{}: MT {:.1} ms, speed {:.3} px/ms, TP {:.2} bit/s",
            record.index, self.expected, mt, speed, throughput
        );
        self.trials.push(record);
        record
    }

    pub fn end(&mut self, end: SessionEnd) {
        self.end = Some(end);
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn is_complete(&self) -> bool {
        self.trials.len() >= self.expected
    }

    /// Trials used for averages: warm-up trials are dropped unless that
    /// would leave nothing.
    fn scored(&self) -> &[TrialRecord] {
        if self.trials.len() > self.warmup {
            &self.trials[self.warmup..]
        } else {
            &self.trials
        }
    }

    pub fn summary(&self) -> TrialSummary {
        let scored = self.scored();
        let mean = |f: fn(&TrialRecord) -> f64| {
            (!scored.is_empty()).then(|| scored.iter().map(f).sum::<f64>() / scored.len() as f64)
        };
        TrialSummary {
            participant_id: self.participant_id.clone(),
            width_px: self.width_px,
            distance_px: self.distance_px,
            index_of_difficulty: self.index_of_difficulty,
            expected_trials: self.expected,
            completed_trials: self.trials.len(),
            complete: self.is_complete() && self.end.is_none_or(|e| e.is_complete()),
            excluded_trials: self.trials.len() - scored.len(),
            mean_movement_time_ms: mean(|t| t.movement_time_ms),
            mean_speed: mean(|t| t.speed),
            mean_throughput: mean(|t| t.throughput),
            end: self.end,
            trials: self.trials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penplane_core::TargetBounds;

    fn trigger(index: usize, ms: u64) -> TriggerEvent {
        TriggerEvent {
            frame_number: index as u64 * 100,
            timestamp_ns: ms * 1_000_000,
            index,
            side: Side::Right,
            bounds: TargetBounds {
                low_mm: 0.0,
                high_mm: 1.0,
            },
            x_local: 0.5,
        }
    }

    fn config(trials: usize) -> ExperimentConfig {
        // W 80, D 240: ID = 2 bits
        ExperimentConfig {
            trial_count: trials,
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn computes_fitts_measures() {
        let mut log = TrialLog::new(&config(10), 0);
        let r = log.record(&trigger(1, 500));
        assert_eq!(r.movement_time_ms, 500.0);
        assert!((r.speed - 240.0 / 500.0).abs() < 1e-12);
        assert!((r.throughput - 4.0).abs() < 1e-12);

        let r = log.record(&trigger(2, 750));
        assert_eq!(r.movement_time_ms, 250.0);
        assert!((r.throughput - 8.0).abs() < 1e-12);
    }

    #[test]
    fn averages_skip_warmup_trials() {
        let mut log = TrialLog::new(&config(5), 0);
        // MTs: 1000, 1000, 1000, 200, 400
        for (i, t) in [1000, 2000, 3000, 3200, 3600].into_iter().enumerate() {
            log.record(&trigger(i + 1, t));
        }
        log.end(SessionEnd::Completed { triggers: 5 });
        let s = log.summary();
        assert!(s.complete);
        assert_eq!(s.excluded_trials, 3);
        assert!((s.mean_movement_time_ms.unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn short_session_averages_everything_and_is_incomplete() {
        let mut log = TrialLog::new(&config(10), 1_000_000_000);
        log.record(&trigger(1, 1400));
        log.record(&trigger(2, 2000));
        log.end(SessionEnd::Disconnected {
            triggers: 2,
            expected: 10,
        });
        let s = log.summary();
        assert!(!s.complete);
        assert_eq!(s.completed_trials, 2);
        assert_eq!(s.excluded_trials, 0);
        assert!((s.mean_movement_time_ms.unwrap() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn empty_log_has_no_means() {
        let s = TrialLog::new(&config(3), 0).summary();
        assert_eq!(s.mean_speed, None);
        assert!(!s.complete);
    }

    #[test]
    fn zero_movement_time_scores_zero() {
        let mut log = TrialLog::new(&config(3), 5_000_000);
        let r = log.record(&trigger(1, 5));
        assert_eq!((r.speed, r.throughput), (0.0, 0.0));
    }
}
