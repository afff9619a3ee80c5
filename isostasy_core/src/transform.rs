// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Local element transforms.
//!
//! Most elements carry no transform or a planar [`Affine`]. Elements with a
//! projective [`Transform3d`] are flattened onto their parent's plane: content
//! lives at `z = 0` in local space, goes through the 4×4 matrix, and the
//! resulting `z` is dropped after the perspective divide. That makes the
//! mapping a plane-to-plane homography, which is what bounds projection and
//! hit-test unprojection use.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Affine, Point, Rect, Vec2};

/// Smallest `w` (after projection) or determinant treated as non-degenerate.
const EPSILON: f64 = 1e-9;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Y axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_y(radians: f64) -> Self {
        #[cfg(feature = "std")]
        let (s, c) = radians.sin_cos();
        #[cfg(not(feature = "std"))]
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a perspective projection with the eye at distance `depth` on
    /// the positive z axis.
    #[inline]
    #[must_use]
    pub fn from_perspective(depth: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, -1.0 / depth],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Embeds a planar affine transform.
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Returns whether the transform maps the `z = 0` plane onto the `z = 0`
    /// plane without perspective, i.e. it is an [`Affine`] in disguise.
    #[must_use]
    pub fn is_2d(&self) -> bool {
        let c = &self.cols;
        c[0][2] == 0.0
            && c[0][3] == 0.0
            && c[1][2] == 0.0
            && c[1][3] == 0.0
            && c[3][2] == 0.0
            && c[3][3] == 1.0
    }

    /// Returns the planar part of the transform as an [`Affine`].
    ///
    /// Only meaningful when [`is_2d`](Self::is_2d) holds.
    #[must_use]
    pub fn to_affine(&self) -> Affine {
        let c = &self.cols;
        Affine::new([c[0][0], c[0][1], c[1][0], c[1][1], c[3][0], c[3][1]])
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }

    /// Row-major 3×3 homography for points on the local `z = 0` plane.
    fn homography(&self) -> [[f64; 3]; 3] {
        let c = &self.cols;
        [
            [c[0][0], c[1][0], c[3][0]],
            [c[0][1], c[1][1], c[3][1]],
            [c[0][3], c[1][3], c[3][3]],
        ]
    }

    /// Maps a local point through the transform, flattening onto the target
    /// plane.
    ///
    /// Returns `None` if the point lands at or behind the eye.
    #[must_use]
    pub fn project_point(&self, p: Point) -> Option<Point> {
        apply_homography(&self.homography(), p)
    }

    /// Finds the local point that projects onto `p`.
    ///
    /// Returns `None` if the transform is degenerate or the preimage lies
    /// behind the eye.
    #[must_use]
    pub fn unproject_point(&self, p: Point) -> Option<Point> {
        let inv = invert_3x3(&self.homography())?;
        apply_homography(&inv, p)
    }

    /// Bounding box of a projected rectangle.
    #[must_use]
    pub fn project_rect_bbox(&self, rect: Rect) -> Option<Rect> {
        let h = self.homography();
        corners_bbox(rect, |p| apply_homography(&h, p))
    }

    /// Bounding box of the preimage of a rectangle.
    #[must_use]
    pub fn unproject_rect_bbox(&self, rect: Rect) -> Option<Rect> {
        let inv = invert_3x3(&self.homography())?;
        corners_bbox(rect, |p| apply_homography(&inv, p))
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        for (j, col) in out.iter_mut().enumerate() {
            for (i, v) in col.iter_mut().enumerate() {
                *v = a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
            }
        }
        Self { cols: out }
    }
}

fn apply_homography(h: &[[f64; 3]; 3], p: Point) -> Option<Point> {
    let x = h[0][0] * p.x + h[0][1] * p.y + h[0][2];
    let y = h[1][0] * p.x + h[1][1] * p.y + h[1][2];
    let w = h[2][0] * p.x + h[2][1] * p.y + h[2][2];
    if w <= EPSILON {
        return None;
    }
    Some(Point::new(x / w, y / w))
}

fn invert_3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let cof00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let cof01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let cof02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
    let det = m[0][0] * cof00 + m[0][1] * cof01 + m[0][2] * cof02;
    if det.abs() <= EPSILON || !det.is_finite() {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            cof00 * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            cof01 * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            cof02 * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

fn corners_bbox(rect: Rect, mut map: impl FnMut(Point) -> Option<Point>) -> Option<Rect> {
    let p0 = map(Point::new(rect.x0, rect.y0))?;
    let p1 = map(Point::new(rect.x1, rect.y0))?;
    let p2 = map(Point::new(rect.x1, rect.y1))?;
    let p3 = map(Point::new(rect.x0, rect.y1))?;
    Some(
        Rect::from_points(p0, p1)
            .union_pt(p2)
            .union_pt(p3),
    )
}

/// The transform an element applies to its content, relative to its
/// arranged position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LocalTransform {
    /// No transform.
    #[default]
    Identity,
    /// A planar transform.
    Affine(Affine),
    /// A 4×4 transform, possibly with depth or perspective.
    Projective(Transform3d),
}

impl LocalTransform {
    /// Normalizes a 4×4 transform, demoting it to [`Affine`](Self::Affine)
    /// when it has no depth.
    #[must_use]
    pub fn from_transform3d(t: Transform3d) -> Self {
        if t == Transform3d::IDENTITY {
            Self::Identity
        } else if t.is_2d() {
            Self::Affine(t.to_affine())
        } else {
            Self::Projective(t)
        }
    }

    /// Whether content under this transform leaves the parent's plane.
    #[must_use]
    pub fn has_depth(&self) -> bool {
        match self {
            Self::Projective(t) => !t.is_2d(),
            Self::Identity | Self::Affine(_) => false,
        }
    }

    /// Applies `offset` after this transform.
    #[must_use]
    pub fn then_translate(self, offset: Vec2) -> Self {
        if offset == Vec2::ZERO {
            return self;
        }
        match self {
            Self::Identity => Self::Affine(Affine::translate(offset)),
            Self::Affine(a) => Self::Affine(a.then_translate(offset)),
            Self::Projective(t) => {
                Self::Projective(Transform3d::from_translation(offset.x, offset.y, 0.0) * t)
            }
        }
    }

    /// Expands to a 4×4 matrix.
    #[must_use]
    pub fn to_transform3d(self) -> Transform3d {
        match self {
            Self::Identity => Transform3d::IDENTITY,
            Self::Affine(a) => Transform3d::from_affine(a),
            Self::Projective(t) => t,
        }
    }

    /// Maps a local point into the parent's space.
    #[must_use]
    pub fn transform_point(&self, p: Point) -> Option<Point> {
        match self {
            Self::Identity => Some(p),
            Self::Affine(a) => Some(*a * p),
            Self::Projective(t) => t.project_point(p),
        }
    }

    /// Maps a point in the parent's space back into local space.
    ///
    /// Returns `None` if the transform is not invertible there.
    #[must_use]
    pub fn inverse_transform_point(&self, p: Point) -> Option<Point> {
        match self {
            Self::Identity => Some(p),
            Self::Affine(a) => invert_affine(*a).map(|inv| inv * p),
            Self::Projective(t) => t.unproject_point(p),
        }
    }

    /// Bounding box of a local rectangle in the parent's space.
    #[must_use]
    pub fn transform_rect_bbox(&self, rect: Rect) -> Option<Rect> {
        match self {
            Self::Identity => Some(rect),
            Self::Affine(a) => Some(a.transform_rect_bbox(rect)),
            Self::Projective(t) => t.project_rect_bbox(rect),
        }
    }

    /// Bounding box of a parent-space rectangle pulled back into local space.
    #[must_use]
    pub fn inverse_transform_rect_bbox(&self, rect: Rect) -> Option<Rect> {
        match self {
            Self::Identity => Some(rect),
            Self::Affine(a) => invert_affine(*a).map(|inv| inv.transform_rect_bbox(rect)),
            Self::Projective(t) => t.unproject_rect_bbox(rect),
        }
    }
}

fn invert_affine(a: Affine) -> Option<Affine> {
    let det = a.determinant();
    if det.abs() <= EPSILON || !det.is_finite() {
        None
    } else {
        Some(a.inverse())
    }
}
