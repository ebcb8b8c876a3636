//! Display-plane fitting and pen-tip projection.
//!
//! Everything here works in the motion-capture unit (millimetres). Nothing is
//! cached between frames: the display may shift, so callers fit a fresh
//! [`ScreenPlane`] for every valid frame.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};
use thiserror::Error;

/// Spanning vectors shorter than this are treated as collapsed.
pub const DEGENERATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` when the length is below
    /// [`DEGENERATE_EPSILON`] (or not a number).
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.norm();
        if len > DEGENERATE_EPSILON {
            Some(self / len)
        } else {
            None
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Exact zero is what the tracker reports for an occluded marker.
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Vec3::new(x, y, z)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("edge {edge} collapsed (length {length:.3e} mm)")]
    CollapsedEdge { edge: &'static str, length: f64 },
    #[error("corner markers are collinear, plane normal is undefined")]
    CollinearCorners,
}

fn unit_edge(edge: &'static str, span: Vec3) -> Result<(Vec3, f64), GeometryError> {
    let length = span.norm();
    match span.normalized() {
        Some(unit) => Ok((unit, length)),
        None => Err(GeometryError::CollapsedEdge { edge, length }),
    }
}

/// Display plane fitted from four corner markers.
///
/// `corner[1] - corner[0]` and `corner[3] - corner[0]` span the plane; with the
/// top-right, bottom-right, bottom-left, top-left marker order that means `u`
/// runs down the right edge and `v` runs across the top edge. Local
/// coordinates use [`ScreenPlane::display_axes`] instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPlane {
    pub corners: [Vec3; 4],
    pub origin: Vec3,
    pub normal: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub u_len: f64,
    pub v_len: f64,
}

/// Horizontal and vertical display axes, shared by every projection.
///
/// `y` follows the edge `corner[2] -> corner[3]`; `x` follows
/// `corner[2] -> corner[1]` with its `y` component removed, so the axes stay
/// orthogonal on a slightly skewed marker rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayAxes {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub x_len: f64,
    pub y_len: f64,
}

impl ScreenPlane {
    pub fn fit(corners: [Vec3; 4]) -> Result<Self, GeometryError> {
        let span_u = corners[1] - corners[0];
        let span_v = corners[3] - corners[0];
        let (u, u_len) = unit_edge("corner[1]-corner[0]", span_u)?;
        let (v, v_len) = unit_edge("corner[3]-corner[0]", span_v)?;
        let normal = span_u
            .cross(span_v)
            .normalized()
            .ok_or(GeometryError::CollinearCorners)?;

        Ok(Self {
            corners,
            origin: corners[0],
            normal,
            u,
            v,
            u_len,
            v_len,
        })
    }

    /// Signed perpendicular distance; the sign follows the normal.
    pub fn signed_distance(&self, point: Vec3) -> f64 {
        (point - self.origin).dot(self.normal)
    }

    pub fn project(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    pub fn centroid(&self) -> Vec3 {
        let [a, b, c, d] = self.corners;
        (a + b + c + d) / 4.0
    }

    pub fn display_axes(&self) -> Result<DisplayAxes, GeometryError> {
        let origin = self.corners[2];
        let (y_axis, y_len) = unit_edge("corner[3]-corner[2]", self.corners[3] - origin)?;
        let across = self.corners[1] - origin;
        let across = across - y_axis * across.dot(y_axis);
        let (x_axis, x_len) = unit_edge("corner[1]-corner[2]", across)?;
        Ok(DisplayAxes {
            x_axis,
            y_axis,
            x_len,
            y_len,
        })
    }
}

/// Pen position in plane-local coordinates, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalPoint {
    pub x: f64,
    pub y: f64,
}

/// Closed rectangle of local coordinates that counts as "on the display".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalExtent {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl LocalExtent {
    pub fn contains(&self, p: LocalPoint) -> bool {
        self.x.0 <= p.x && p.x <= self.x.1 && self.y.0 <= p.y && p.y <= self.y.1
    }
}

/// Strategy for expressing a point on the plane in local coordinates.
pub trait Projection {
    fn project(&self, plane: &ScreenPlane, point: Vec3) -> Result<LocalPoint, GeometryError>;
    fn extent(&self, plane: &ScreenPlane) -> Result<LocalExtent, GeometryError>;
}

/// Origin at the corner centroid, axes from [`ScreenPlane::display_axes`].
/// Local `x` is the reference-edge `x` minus half the display width.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenteredBasis;

impl Projection for CenteredBasis {
    fn project(&self, plane: &ScreenPlane, point: Vec3) -> Result<LocalPoint, GeometryError> {
        let axes = plane.display_axes()?;
        let rel = plane.project(point) - plane.centroid();
        Ok(LocalPoint {
            x: rel.dot(axes.x_axis),
            y: rel.dot(axes.y_axis),
        })
    }

    fn extent(&self, plane: &ScreenPlane) -> Result<LocalExtent, GeometryError> {
        let axes = plane.display_axes()?;
        let (hw, hh) = (axes.x_len / 2.0, axes.y_len / 2.0);
        Ok(LocalExtent {
            x: (-hw, hw),
            y: (-hh, hh),
        })
    }
}

/// Origin at `corner[2]` (bottom-left), axes from [`ScreenPlane::display_axes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEdge;

impl Projection for ReferenceEdge {
    fn project(&self, plane: &ScreenPlane, point: Vec3) -> Result<LocalPoint, GeometryError> {
        let axes = plane.display_axes()?;
        let rel = plane.project(point) - plane.corners[2];
        Ok(LocalPoint {
            x: rel.dot(axes.x_axis),
            y: rel.dot(axes.y_axis),
        })
    }

    fn extent(&self, plane: &ScreenPlane) -> Result<LocalExtent, GeometryError> {
        let axes = plane.display_axes()?;
        Ok(LocalExtent {
            x: (0.0, axes.x_len),
            y: (0.0, axes.y_len),
        })
    }
}

/// Configuration-selectable projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionConvention {
    CenteredBasis,
    #[default]
    ReferenceEdge,
}

impl ProjectionConvention {
    /// Position of the local `x` origin measured from the display's left
    /// edge, for a display `screen_width_mm` wide.
    pub fn x_origin_mm(&self, screen_width_mm: f64) -> f64 {
        match self {
            ProjectionConvention::CenteredBasis => screen_width_mm / 2.0,
            ProjectionConvention::ReferenceEdge => 0.0,
        }
    }
}

impl Projection for ProjectionConvention {
    fn project(&self, plane: &ScreenPlane, point: Vec3) -> Result<LocalPoint, GeometryError> {
        match self {
            ProjectionConvention::CenteredBasis => CenteredBasis.project(plane, point),
            ProjectionConvention::ReferenceEdge => ReferenceEdge.project(plane, point),
        }
    }

    fn extent(&self, plane: &ScreenPlane) -> Result<LocalExtent, GeometryError> {
        match self {
            ProjectionConvention::CenteredBasis => CenteredBasis.extent(plane),
            ProjectionConvention::ReferenceEdge => ReferenceEdge.extent(plane),
        }
    }
}

/// Everything the classifier needs from one frame's geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub plane: ScreenPlane,
    pub distance: f64,
    pub local: LocalPoint,
    pub extent: LocalExtent,
}

pub fn measure<P: Projection + ?Sized>(
    corners: [Vec3; 4],
    pen_tip: Vec3,
    projection: &P,
) -> Result<Measurement, GeometryError> {
    let plane = ScreenPlane::fit(corners)?;
    let local = projection.project(&plane, pen_tip)?;
    let extent = projection.extent(&plane)?;
    Ok(Measurement {
        distance: plane.signed_distance(pen_tip),
        plane,
        local,
        extent,
    })
}
