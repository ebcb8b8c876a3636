use crate::geometry::{LocalExtent, LocalPoint, Measurement, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchStatus {
    NotTouching,
    Touching,
    OutsideBounds,
}

impl TouchStatus {
    pub fn is_touching(&self) -> bool {
        matches!(self, TouchStatus::Touching)
    }
}

/// Classification of one valid frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchSample {
    pub frame_number: u64,
    pub pen_tip: Vec3,
    /// Signed perpendicular distance to the display plane, mm.
    pub distance: f64,
    pub local: LocalPoint,
    pub status: TouchStatus,
}

/// Maps plane geometry to a [`TouchStatus`] with a proximity threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchClassifier {
    threshold_mm: f64,
}

impl TouchClassifier {
    pub fn new(threshold_mm: f64) -> Self {
        Self { threshold_mm }
    }

    pub fn threshold_mm(&self) -> f64 {
        self.threshold_mm
    }

    pub fn classify(&self, distance: f64, local: LocalPoint, extent: &LocalExtent) -> TouchStatus {
        // NaN distances fall through to NotTouching
        if !(distance.abs() < self.threshold_mm) {
            TouchStatus::NotTouching
        } else if extent.contains(local) {
            TouchStatus::Touching
        } else {
            TouchStatus::OutsideBounds
        }
    }

    pub fn sample(&self, frame_number: u64, pen_tip: Vec3, m: &Measurement) -> TouchSample {
        TouchSample {
            frame_number,
            pen_tip,
            distance: m.distance,
            local: m.local,
            status: self.classify(m.distance, m.local, &m.extent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: LocalExtent = LocalExtent {
        x: (-50.0, 50.0),
        y: (-25.0, 25.0),
    };

    fn at(x: f64, y: f64) -> LocalPoint {
        LocalPoint { x, y }
    }

    #[test]
    fn far_pen_is_not_touching_even_inside_extent() {
        let c = TouchClassifier::new(8.0);
        assert_eq!(c.classify(12.0, at(0.0, 0.0), &EXTENT), TouchStatus::NotTouching);
        assert_eq!(c.classify(-12.0, at(0.0, 0.0), &EXTENT), TouchStatus::NotTouching);
        assert_eq!(c.classify(8.0, at(0.0, 0.0), &EXTENT), TouchStatus::NotTouching);
    }

    #[test]
    fn near_pen_is_touching_inside_and_outside_beyond() {
        let c = TouchClassifier::new(4.0);
        assert_eq!(c.classify(-3.9, at(50.0, -25.0), &EXTENT), TouchStatus::Touching);
        assert_eq!(c.classify(1.0, at(50.1, 0.0), &EXTENT), TouchStatus::OutsideBounds);
        assert_eq!(c.classify(1.0, at(0.0, 26.0), &EXTENT), TouchStatus::OutsideBounds);
    }

    #[test]
    fn nan_distance_is_not_touching() {
        let c = TouchClassifier::new(8.0);
        assert_eq!(c.classify(f64::NAN, at(0.0, 0.0), &EXTENT), TouchStatus::NotTouching);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = TouchClassifier::new(6.0);
        let first = c.classify(2.5, at(10.0, 10.0), &EXTENT);
        for _ in 0..100 {
            assert_eq!(c.classify(2.5, at(10.0, 10.0), &EXTENT), first);
        }
    }
}
