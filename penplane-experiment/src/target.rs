//! Target placement and the pixel-to-millimetre conversion.
//!
//! This is the only place where canvas pixels meet physical units. Bounds come
//! out in the same local-`x` frame the pen is projected into, so the trigger
//! logic compares like with like.

use crate::config::{ExperimentConfig, OffsetConvention};
use penplane_core::{ProjectionConvention, Side, TargetBounds};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetModel {
    width_px: f64,
    distance_px: f64,
    side: Side,
    canvas_width_px: f64,
    screen_width_mm: f64,
    offset: OffsetConvention,
    projection: ProjectionConvention,
    bounds: TargetBounds,
}

impl TargetModel {
    pub fn new(
        width_px: f64,
        distance_px: f64,
        side: Side,
        canvas_width_px: f64,
        screen_width_mm: f64,
        offset: OffsetConvention,
        projection: ProjectionConvention,
    ) -> Self {
        let mut model = Self {
            width_px,
            distance_px,
            side,
            canvas_width_px,
            screen_width_mm,
            offset,
            projection,
            bounds: TargetBounds {
                low_mm: 0.0,
                high_mm: 0.0,
            },
        };
        model.bounds = model.compute_bounds();
        model
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(
            config.target_width_px(),
            config.target_distance_px(),
            config.initial_side,
            config.canvas_width_px,
            config.screen_width_mm,
            config.target_offset,
            config.projection,
        )
    }

    pub fn px_to_mm(&self) -> f64 {
        self.screen_width_mm / self.canvas_width_px
    }

    /// Left edge of the target rectangle on the canvas, px.
    pub fn rect_x_px(&self) -> f64 {
        let centre_px = self.canvas_width_px / 2.0;
        centre_px + self.side.sign() * self.offset.centre_offset_px(self.distance_px)
            - self.width_px / 2.0
    }

    fn compute_bounds(&self) -> TargetBounds {
        let k = self.px_to_mm();
        let origin_mm = self.projection.x_origin_mm(self.screen_width_mm);
        let rect_x = self.rect_x_px();
        TargetBounds {
            low_mm: rect_x * k - origin_mm,
            high_mm: (rect_x + self.width_px) * k - origin_mm,
        }
    }

    pub fn bounds(&self) -> TargetBounds {
        self.bounds
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn distance_px(&self) -> f64 {
        self.distance_px
    }

    /// Moves the target to the opposite side.
    pub fn advance(&mut self) {
        self.side = self.side.flipped();
        self.bounds = self.compute_bounds();
        debug!(
            side = ?self.side,
            low_mm = self.bounds.low_mm,
            high_mm = self.bounds.high_mm,
            "target moved"
        );
    }
}
