//! Marker sources for replay and simulation.

use penplane_core::{
    GeometryError, MarkerFrame, MarkerLayout, MarkerSource, Projection, ProjectionConvention,
    ScreenPlane, SourceError, Vec3,
};
use penplane_timing::Timer;
use rand::Rng;
use std::io::BufRead;
use std::time::Duration;
use tracing::debug;

/// Recorded stream: one `{"frame": n, "markers": [[x, y, z], ...]}` per line.
pub struct JsonLinesSource<R, T> {
    reader: R,
    line: usize,
    buf: String,
    pacing: Option<(T, Duration)>,
}

impl<R, T> JsonLinesSource<R, T>
where
    R: BufRead + Send,
    T: Timer<Timestamp = u64>,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
            pacing: None,
        }
    }

    /// Sleeps `interval` on `timer` before each frame.
    pub fn paced(mut self, timer: T, interval: Duration) -> Self {
        self.pacing = Some((timer, interval));
        self
    }
}

impl<R, T> MarkerSource for JsonLinesSource<R, T>
where
    R: BufRead + Send,
    T: Timer<Timestamp = u64>,
{
    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<MarkerFrame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Err(SourceError::Disconnected);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            let frame = serde_json::from_str::<MarkerFrame>(text).map_err(|e| {
                SourceError::Malformed {
                    line: self.line,
                    message: e.to_string(),
                }
            })?;
            if let Some((timer, interval)) = &self.pacing {
                timer.sleep(*interval);
            }
            return Ok(Some(frame));
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyntheticParams {
    pub interval: Duration,
    pub noise_mm: f64,
    pub dropout: f64,
    pub sweep: Duration,
    /// Pen height above the display while "touching".
    pub hover_mm: f64,
}

fn bad_display(e: GeometryError) -> SourceError {
    SourceError::Malformed {
        line: 0,
        message: e.to_string(),
    }
}

/// Local axes of a projection expressed in mocap coordinates.
struct LocalFrame {
    origin: Vec3,
    x_dir: Vec3,
    y_dir: Vec3,
    normal: Vec3,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

/// A flat display seen from above with a pen sweeping along local `x` in a
/// sinusoid, plus uniform noise and random corner dropouts.
pub struct SyntheticSource<T, R> {
    timer: T,
    rng: R,
    params: SyntheticParams,
    layout: MarkerLayout,
    corners: [Vec3; 4],
    local: LocalFrame,
    frame_number: u64,
}

impl<T, R> SyntheticSource<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng + Send,
{
    /// Display `width_mm` by `height_mm` in the `z = 0` plane, corners in
    /// top-right, bottom-right, bottom-left, top-left order.
    pub fn new(
        timer: T,
        rng: R,
        params: SyntheticParams,
        layout: MarkerLayout,
        projection: ProjectionConvention,
        width_mm: f64,
        height_mm: f64,
    ) -> Result<Self, SourceError> {
        let corners = [
            Vec3::new(width_mm, height_mm, 0.0),
            Vec3::new(width_mm, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, height_mm, 0.0),
        ];
        let plane = ScreenPlane::fit(corners).map_err(bad_display)?;
        let extent = projection.extent(&plane).map_err(bad_display)?;
        let axes = plane.display_axes().map_err(bad_display)?;
        let origin = match projection {
            ProjectionConvention::CenteredBasis => plane.centroid(),
            ProjectionConvention::ReferenceEdge => corners[2],
        };
        Ok(Self {
            timer,
            rng,
            params,
            layout,
            corners,
            local: LocalFrame {
                origin,
                x_dir: axes.x_axis,
                y_dir: axes.y_axis,
                normal: plane.normal,
                x_range: extent.x,
                y_range: extent.y,
            },
            frame_number: 0,
        })
    }

    fn jitter(&mut self) -> f64 {
        let n = self.params.noise_mm;
        self.rng.random_range(-n..=n)
    }

    fn pen_at(&mut self, t_secs: f64) -> Vec3 {
        let (x0, x1) = self.local.x_range;
        let (y0, y1) = self.local.y_range;
        let period = self.params.sweep.as_secs_f64().max(1e-3);
        let phase = std::f64::consts::TAU * t_secs / period;
        let x = (x0 + x1) / 2.0 + 0.45 * (x1 - x0) * phase.sin() + self.jitter();
        let y = (y0 + y1) / 2.0 + self.jitter();
        let z = self.params.hover_mm + self.jitter().abs();
        self.local.origin + self.local.x_dir * x + self.local.y_dir * y + self.local.normal * z
    }

    fn build_frame(&mut self, t_secs: f64) -> MarkerFrame {
        let count = self.layout.min_markers();
        // unused slots carry a harmless marker off to the side
        let mut markers = vec![Vec3::new(-50.0, -50.0, 10.0); count];
        let slots = self.layout.corners;
        for (slot, corner) in slots.into_iter().zip(self.corners) {
            markers[slot] = corner + Vec3::new(self.jitter(), self.jitter(), self.jitter()) * 0.1;
        }
        markers[self.layout.pen_tip] = self.pen_at(t_secs);
        if self.params.dropout > 0.0 && self.rng.random_bool(self.params.dropout.min(1.0)) {
            let lost = self.layout.corners[self.rng.random_range(0..4)];
            markers[lost] = Vec3::ZERO;
            debug!("synthetic dropout of marker {} in frame {}", lost, self.frame_number);
        }
        MarkerFrame::new(self.frame_number, markers)
    }
}

impl<T, R> MarkerSource for SyntheticSource<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng + Send,
{
    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<MarkerFrame>, SourceError> {
        self.timer.sleep(self.params.interval);
        self.frame_number += 1;
        let t = self.frame_number as f64 * self.params.interval.as_secs_f64();
        Ok(Some(self.build_frame(t)))
    }
}
