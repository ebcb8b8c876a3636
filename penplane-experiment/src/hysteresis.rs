use crate::config::BinConfig;

/// An accepted move from one bin to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinChange {
    pub from: usize,
    pub to: usize,
    pub x_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    bin: usize,
    x_mm: f64,
}

/// Quantises a position into equal-width bins and reports bin changes,
/// ignoring changes that happen within a dead zone of the last accepted one.
#[derive(Debug, Clone)]
pub struct BinHysteresis {
    bins: BinConfig,
    dead_zone_mm: f64,
    baseline: Option<Baseline>,
}

impl BinHysteresis {
    pub fn new(bins: BinConfig, hysteresis_fraction: f64) -> Self {
        Self {
            dead_zone_mm: hysteresis_fraction * bins.bin_width_mm(),
            bins,
            baseline: None,
        }
    }

    pub fn dead_zone_mm(&self) -> f64 {
        self.dead_zone_mm
    }

    pub fn bin_of(&self, x_mm: f64) -> usize {
        let raw = ((x_mm - self.bins.range_min_mm) / self.bins.bin_width_mm()).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.bins.count.saturating_sub(1))
        }
    }

    /// `None` means the position is unknown this frame; the next known
    /// position becomes a fresh baseline without reporting a change.
    pub fn observe(&mut self, x_mm: Option<f64>) -> Option<BinChange> {
        let Some(x_mm) = x_mm else {
            self.baseline = None;
            return None;
        };
        let bin = self.bin_of(x_mm);
        let Some(base) = self.baseline else {
            self.baseline = Some(Baseline { bin, x_mm });
            return None;
        };
        if bin == base.bin || (x_mm - base.x_mm).abs() <= self.dead_zone_mm {
            return None;
        }
        self.baseline = Some(Baseline { bin, x_mm });
        Some(BinChange {
            from: base.bin,
            to: bin,
            x_mm,
        })
    }

    pub fn current_bin(&self) -> Option<usize> {
        self.baseline.map(|b| b.bin)
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ten 10 mm bins over 0..100 mm, 3 mm dead zone
    fn ten_bins() -> BinHysteresis {
        BinHysteresis::new(
            BinConfig {
                count: 10,
                range_min_mm: 0.0,
                range_max_mm: 100.0,
            },
            0.3,
        )
    }

    #[test]
    fn positions_clamp_to_the_range() {
        let h = ten_bins();
        assert_eq!(h.bin_of(-5.0), 0);
        assert_eq!(h.bin_of(0.0), 0);
        assert_eq!(h.bin_of(9.999), 0);
        assert_eq!(h.bin_of(10.0), 1);
        assert_eq!(h.bin_of(100.0), 9);
        assert_eq!(h.bin_of(250.0), 9);
    }

    #[test]
    fn first_position_is_a_baseline() {
        let mut h = ten_bins();
        assert_eq!(h.observe(Some(55.0)), None);
        assert_eq!(h.current_bin(), Some(5));
    }

    #[test]
    fn oscillation_at_a_boundary_stays_silent() {
        let mut h = ten_bins();
        assert_eq!(h.observe(Some(49.0)), None);
        let mut fired = 0;
        for i in 0..200 {
            let jitter = if i % 2 == 0 { 1.2 } else { -1.2 };
            if h.observe(Some(50.0 + jitter)).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);
    }

    #[test]
    fn monotonic_sweep_fires_once_per_boundary() {
        let mut h = ten_bins();
        let mut changes = Vec::new();
        let mut x = 5.0;
        while x < 96.0 {
            if let Some(c) = h.observe(Some(x)) {
                changes.push(c);
            }
            x += 0.25;
        }
        assert_eq!(changes.len(), 9);
        for (i, c) in changes.iter().enumerate() {
            assert_eq!((c.from, c.to), (i, i + 1));
        }
    }

    #[test]
    fn unknown_position_resets_the_baseline() {
        let mut h = ten_bins();
        h.observe(Some(15.0));
        assert_eq!(h.observe(None), None);
        assert_eq!(h.current_bin(), None);
        // far away, but it only establishes a new baseline
        assert_eq!(h.observe(Some(85.0)), None);
        assert!(h.observe(Some(95.0)).is_some());
    }

    #[test]
    fn large_jump_is_a_single_change() {
        let mut h = ten_bins();
        h.observe(Some(5.0));
        let change = h.observe(Some(72.0)).unwrap();
        assert_eq!((change.from, change.to), (0, 7));
    }

    #[test]
    fn empty_bin_config_maps_everything_to_bin_zero() {
        let mut h = BinHysteresis::new(
            BinConfig {
                count: 0,
                range_min_mm: 0.0,
                range_max_mm: 100.0,
            },
            0.3,
        );
        assert_eq!(h.bin_of(50.0), 0);
        assert_eq!(h.observe(Some(10.0)), None);
        assert_eq!(h.observe(Some(90.0)), None);
    }
}
