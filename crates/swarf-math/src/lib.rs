#![warn(missing_docs)]

//! Math types for the swarf cutting-simulation kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for the
//! volumetric simulation: points, vectors, the rotation helpers shared by
//! all rotated volumes, axis-aligned bounding boxes, and tolerance
//! constants.

use nalgebra::{Matrix3, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// Rotate `p` about the axis through `origin` along `axis` by `angle`
/// radians.
///
/// Uses Rodrigues' rotation formula. `axis` must be normalized.
pub fn rotate_about_axis(p: Point3, origin: Point3, axis: Vec3, angle: f64) -> Point3 {
    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);
    let m = Matrix3::new(
        t * x * x + c,
        t * x * y - s * z,
        t * x * z + s * y,
        t * x * y + s * z,
        t * y * y + c,
        t * y * z - s * x,
        t * x * z - s * y,
        t * y * z + s * x,
        t * z * z + c,
    );
    origin + m * (p - origin)
}

/// The composite rotation shared by all rotated volumes: rotate about X
/// by `a`, then about Z by `c` radians.
pub fn rotate_xz(v: Vec3, a: f64, c: f64) -> Vec3 {
    let (xs, xc) = a.sin_cos();
    let (zs, zc) = c.sin_cos();
    Vec3::new(
        v.x * zc - v.y * zs * xc + v.z * zs * xs,
        v.x * zs + v.y * zc * xc - v.z * zc * xs,
        v.y * xs + v.z * xc,
    )
}

/// Inverse of [`rotate_xz`]: takes a world-space point into the frame of
/// a volume that was rotated about X by `a` then about Z by `c`.
pub fn rotate_xz_inv(v: Vec3, a: f64, c: f64) -> Vec3 {
    let (xs, xc) = a.sin_cos();
    let (zs, zc) = c.sin_cos();
    Vec3::new(
        v.x * zc + v.y * zs,
        -v.x * zs * xc + v.y * zc * xc + v.z * xs,
        v.x * zs * xs - v.y * zc * xs + v.z * xc,
    )
}

/// Axis-aligned bounding box.
///
/// Starts empty; the first [`Aabb::add_point`] initializes both corners,
/// after which `min ≤ max` holds componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    minpt: Point3,
    maxpt: Point3,
    initialized: bool,
}

impl Aabb {
    /// Create an empty box.
    pub fn new() -> Self {
        Self {
            minpt: Point3::origin(),
            maxpt: Point3::origin(),
            initialized: false,
        }
    }

    /// Create a box spanning the two given corners.
    pub fn from_corners(a: Point3, b: Point3) -> Self {
        let mut bb = Self::new();
        bb.add_point(a);
        bb.add_point(b);
        bb
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        self.initialized = false;
    }

    /// True if no point has been added yet.
    pub fn is_empty(&self) -> bool {
        !self.initialized
    }

    /// Grow the box so that `p` is contained in it.
    pub fn add_point(&mut self, p: Point3) {
        if !self.initialized {
            self.minpt = p;
            self.maxpt = p;
            self.initialized = true;
        } else {
            self.minpt = Point3::new(
                self.minpt.x.min(p.x),
                self.minpt.y.min(p.y),
                self.minpt.z.min(p.z),
            );
            self.maxpt = Point3::new(
                self.maxpt.x.max(p.x),
                self.maxpt.y.max(p.y),
                self.maxpt.z.max(p.z),
            );
        }
    }

    /// The minimum corner.
    pub fn min(&self) -> Point3 {
        self.minpt
    }

    /// The maximum corner.
    pub fn max(&self) -> Point3 {
        self.maxpt
    }

    /// True if `p` lies inside the box (inclusive).
    pub fn contains_point(&self, p: Point3) -> bool {
        self.initialized
            && p.x >= self.minpt.x
            && p.x <= self.maxpt.x
            && p.y >= self.minpt.y
            && p.y <= self.maxpt.y
            && p.z >= self.minpt.z
            && p.z <= self.maxpt.z
    }

    /// True if this box and `other` overlap. Empty boxes overlap nothing.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        if !self.initialized || !other.initialized {
            return false;
        }
        self.minpt.x <= other.maxpt.x
            && self.maxpt.x >= other.minpt.x
            && self.minpt.y <= other.maxpt.y
            && self.maxpt.y >= other.minpt.y
            && self.minpt.z <= other.maxpt.z
            && self.maxpt.z >= other.minpt.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-6 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Margin added to volume bounding boxes so that corner samples right on a
/// face are never missed by the overlap test.
pub const GEOM_TOLERANCE: f64 = 1e-6;

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_rotate_about_axis_z() {
        let p = Point3::new(1.0, 0.0, 0.0);
        let r = rotate_about_axis(p, Point3::origin(), Vec3::z(), PI / 2.0);
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
        assert!(r.z.abs() < 1e-12);
    }

    #[test]
    fn test_rotate_about_axis_offset_origin() {
        let p = Point3::new(2.0, 1.0, 0.0);
        let o = Point3::new(1.0, 1.0, 0.0);
        let r = rotate_about_axis(p, o, Vec3::z(), PI);
        assert!((r.x - 0.0).abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_xz_identity() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = rotate_xz(v, 0.0, 0.0);
        assert!((r - v).norm() < 1e-12);
    }

    #[test]
    fn test_rotate_xz_z_only() {
        // with a = 0 the composite reduces to a plain Z rotation
        let v = Vec3::new(1.0, 0.0, 0.0);
        let r = rotate_xz(v, 0.0, PI / 2.0);
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_xz_preserves_length() {
        let v = Vec3::new(0.3, -1.2, 2.5);
        let r = rotate_xz(v, 0.7, -1.3);
        assert!((r.norm() - v.norm()).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_xz_matches_successive_axis_rotations() {
        let p = Point3::new(0.4, -0.7, 1.1);
        let (a, c) = (0.6, -1.1);
        let by_axis = {
            let r = rotate_about_axis(p, Point3::origin(), Vec3::x(), a);
            rotate_about_axis(r, Point3::origin(), Vec3::z(), c)
        };
        let composite = Point3::from(rotate_xz(p.coords, a, c));
        assert!((by_axis - composite).norm() < 1e-12);
    }

    #[test]
    fn test_rotate_xz_inv_round_trip() {
        let v = Vec3::new(1.5, -0.2, 0.9);
        let (a, c) = (0.35, 2.1);
        let back = rotate_xz_inv(rotate_xz(v, a, c), a, c);
        assert!((back - v).norm() < 1e-12);
    }

    #[test]
    fn test_aabb_starts_empty() {
        let bb = Aabb::new();
        assert!(bb.is_empty());
        assert!(!bb.contains_point(Point3::origin()));
    }

    #[test]
    fn test_aabb_grows() {
        let mut bb = Aabb::new();
        bb.add_point(Point3::new(1.0, 1.0, 1.0));
        bb.add_point(Point3::new(-1.0, 2.0, 0.0));
        assert_eq!(bb.min(), Point3::new(-1.0, 1.0, 0.0));
        assert_eq!(bb.max(), Point3::new(1.0, 2.0, 1.0));
        assert!(bb.contains_point(Point3::new(0.0, 1.5, 0.5)));
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::from_corners(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let b = Aabb::from_corners(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
        let c = Aabb::from_corners(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&Aabb::new()));
    }

    #[test]
    fn test_aabb_touching_faces_overlap() {
        let a = Aabb::from_corners(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::from_corners(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_tolerance() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.points_equal(
            &Point3::new(1.0, 2.0, 3.0),
            &Point3::new(1.0 + 1e-8, 2.0, 3.0)
        ));
        assert!(!tol.is_zero(1e-3));
    }
}
