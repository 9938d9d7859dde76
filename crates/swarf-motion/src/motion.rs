//! Straight and helical motion geometry.
//!
//! Motions are evaluated in world coordinates (user origin applied) by
//! arc length `s ∈ [0, length()]`; `s` is clamped at this boundary so a
//! sampler step landing past the end of a move cannot escape the segment.

use swarf_math::Vec3;

use crate::status::{MachineStatus, MotionFlags};

/// Angular slack when unwinding arc angles, from the RS-274 reference
/// implementation.
const CIRCLE_FUZZ: f64 = 1e-6;

/// A sampled tool motion.
#[derive(Debug, Clone)]
pub enum Motion {
    /// Straight feed or traverse.
    Straight(StraightMotion),
    /// Helical arc in the active plane.
    Helical(HelicalMotion),
}

impl Motion {
    /// Arc length of the move; for multi-axis moves the maximum of the
    /// translational and rotational lengths.
    pub fn length(&self) -> f64 {
        match self {
            Motion::Straight(m) => m.length(),
            Motion::Helical(m) => m.length(),
        }
    }

    /// Tool position at arc length `s`.
    pub fn point(&self, s: f64) -> Vec3 {
        match self {
            Motion::Straight(m) => m.point(s),
            Motion::Helical(m) => m.point(s),
        }
    }

    /// Rotational axes at arc length `s`, in radians.
    pub fn angles(&self, s: f64) -> Vec3 {
        match self {
            Motion::Straight(m) => m.angles(s),
            Motion::Helical(m) => m.angles(s),
        }
    }

    /// The motion-kind flag bit for samples of this move.
    pub fn kind_flag(&self) -> MotionFlags {
        match self {
            Motion::Straight(m) if m.traverse => MotionFlags::TRAVERSE,
            Motion::Straight(_) => MotionFlags::STRAIGHT_FEED,
            Motion::Helical(_) => MotionFlags::HELICAL,
        }
    }
}

/// Rotational arc length of an orientation change: the larger lever arm
/// times the direction delta.
fn angular_length(start: Vec3, end: Vec3, start_dir: Vec3, end_dir: Vec3) -> f64 {
    start.norm().max(end.norm()) * (end_dir - start_dir).norm()
}

/// A straight feed or traverse between two world poses.
#[derive(Debug, Clone)]
pub struct StraightMotion {
    /// World start position.
    pub start: Vec3,
    /// World end position.
    pub end: Vec3,
    /// Orientation at the start, radians.
    pub start_dir: Vec3,
    /// Orientation at the end, radians.
    pub end_dir: Vec3,
    /// True for a rapid traverse.
    pub traverse: bool,
}

impl StraightMotion {
    /// Build from the machine status of the line (which already carries
    /// start and end pose) and the traverse flag.
    pub fn from_status(status: &MachineStatus, traverse: bool) -> Self {
        Self {
            start: status.start_pose.loc + status.origin.loc,
            end: status.end_pose.loc + status.origin.loc,
            start_dir: status.start_pose.dir + status.origin.dir,
            end_dir: status.end_pose.dir + status.origin.dir,
            traverse,
        }
    }

    /// Move length; zero-length moves are legal (pure orientation moves
    /// still get the rotational term).
    pub fn length(&self) -> f64 {
        let linear = (self.end - self.start).norm();
        linear.max(angular_length(
            self.start,
            self.end,
            self.start_dir,
            self.end_dir,
        ))
    }

    /// Linear interpolation at arc length `s`.
    pub fn point(&self, s: f64) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return self.start;
        }
        let t = (s / len).clamp(0.0, 1.0);
        self.start + (self.end - self.start) * t
    }

    /// Orientation interpolation at arc length `s`.
    pub fn angles(&self, s: f64) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return self.start_dir;
        }
        let t = (s / len).clamp(0.0, 1.0);
        self.start_dir + (self.end_dir - self.start_dir) * t
    }
}

/// A helical arc: rotation of the centre-to-start vector in the active
/// plane plus linear translation along the plane normal and the
/// rotational axes.
#[derive(Debug, Clone)]
pub struct HelicalMotion {
    /// World-axis indices of the plane's first, second and helix axes.
    axes: (usize, usize, usize),
    /// World start point, by axis.
    o: [f64; 3],
    /// Per-axis world deltas (only the helix axis is nonzero).
    d: [f64; 3],
    /// Arc centre, first plane coordinate.
    cx: f64,
    /// Arc centre, second plane coordinate.
    cy: f64,
    /// Centre-to-start vector in the plane.
    tx: f64,
    ty: f64,
    /// Arc radius.
    radius: f64,
    /// Total signed rotation angle.
    dtheta: f64,
    start: Vec3,
    end: Vec3,
    start_dir: Vec3,
    end_dir: Vec3,
}

impl HelicalMotion {
    /// Build from ARC_FEED arguments: plane end point `(x1, y1)`, plane
    /// centre `(cx, cy)`, signed `rotation` count, helix end `z1`, and
    /// end orientation `(a, b, c)` in radians. `status` supplies the
    /// start pose, plane and origin, and receives the end pose.
    #[allow(clippy::too_many_arguments)]
    pub fn from_arc(
        x1: f64,
        y1: f64,
        cx: f64,
        cy: f64,
        rotation: i32,
        z1: f64,
        end_dir_abc: Vec3,
        status: &mut MachineStatus,
    ) -> Self {
        let (xi, yi, zi) = status.plane.axes();
        let origin = [
            status.origin.loc.x,
            status.origin.loc.y,
            status.origin.loc.z,
        ];
        let start = status.start_pose.loc + status.origin.loc;
        let start_dir = status.start_pose.dir + status.origin.dir;
        let o = [start.x, start.y, start.z];

        // world end point: the plane coordinates plus helix translation
        let mut n = [0.0; 3];
        n[xi] = x1 + origin[xi];
        n[yi] = y1 + origin[yi];
        n[zi] = z1 + origin[zi];
        let cx = cx + origin[xi];
        let cy = cy + origin[yi];

        status.end_pose.loc = Vec3::new(n[0], n[1], n[2]) - status.origin.loc;
        status.end_pose.dir = end_dir_abc;
        let end = Vec3::new(n[0], n[1], n[2]);
        let end_dir = end_dir_abc + status.origin.dir;

        // unwind the end angle by the sign of the rotation, then extend
        // by the extra full turns
        let theta1 = (o[yi] - cy).atan2(o[xi] - cx);
        let mut theta2 = (n[yi] - cy).atan2(n[xi] - cx);
        if rotation < 0 {
            while theta2 - theta1 > -CIRCLE_FUZZ {
                theta2 -= 2.0 * std::f64::consts::PI;
            }
        } else {
            while theta2 - theta1 < CIRCLE_FUZZ {
                theta2 += 2.0 * std::f64::consts::PI;
            }
        }
        if rotation < -1 {
            theta2 += 2.0 * std::f64::consts::PI * f64::from(rotation + 1);
        }
        if rotation > 1 {
            theta2 += 2.0 * std::f64::consts::PI * f64::from(rotation - 1);
        }

        let tx = o[xi] - cx;
        let ty = o[yi] - cy;
        let mut d = [0.0; 3];
        d[zi] = n[zi] - o[zi];

        Self {
            axes: (xi, yi, zi),
            o,
            d,
            cx,
            cy,
            tx,
            ty,
            radius: (tx * tx + ty * ty).sqrt(),
            dtheta: theta2 - theta1,
            start,
            end,
            start_dir,
            end_dir,
        }
    }

    /// Arc radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Total signed rotation angle.
    pub fn dtheta(&self) -> f64 {
        self.dtheta
    }

    /// Helix length `|Δθ|·√(r² + c²)` with `c = Δz/Δθ`, or the
    /// rotational length if the orientation change dominates.
    pub fn length(&self) -> f64 {
        let (_, _, zi) = self.axes;
        let c = self.d[zi] / self.dtheta;
        let helical = self.dtheta.abs() * (self.radius * self.radius + c * c).sqrt();
        helical.max(angular_length(
            self.start,
            self.end,
            self.start_dir,
            self.end_dir,
        ))
    }

    /// Position at arc length `s`: rotate the centre-to-start vector and
    /// translate along the helix axis.
    pub fn point(&self, s: f64) -> Vec3 {
        let (xi, yi, zi) = self.axes;
        let t = (s / self.length()).clamp(0.0, 1.0);
        let theta = t * self.dtheta;
        let (sin_t, cos_t) = theta.sin_cos();
        let txr = self.tx * cos_t - self.ty * sin_t;
        let tyr = self.tx * sin_t + self.ty * cos_t;
        let mut p = [0.0; 3];
        p[xi] = self.cx + txr;
        p[yi] = self.cy + tyr;
        p[zi] = self.o[zi] + t * self.d[zi];
        Vec3::new(p[0], p[1], p[2])
    }

    /// Orientation at arc length `s`.
    pub fn angles(&self, s: f64) -> Vec3 {
        let t = (s / self.length()).clamp(0.0, 1.0);
        self.start_dir + (self.end_dir - self.start_dir) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Plane, Pose};
    use std::f64::consts::PI;

    fn status_at(loc: Vec3) -> MachineStatus {
        MachineStatus::new(Pose::new(loc, Vec3::zeros()), Pose::default())
    }

    #[test]
    fn test_straight_length_is_euclidean() {
        // S1
        let mut status = status_at(Vec3::new(0.0, 0.0, 0.0));
        status.end_pose.loc = Vec3::new(3.0, 4.0, 0.0);
        let m = StraightMotion::from_status(&status, false);
        assert!((m.length() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_straight_point_interpolates_and_clamps() {
        let mut status = status_at(Vec3::zeros());
        status.end_pose.loc = Vec3::new(10.0, 0.0, 0.0);
        let m = StraightMotion::from_status(&status, false);
        assert!((m.point(5.0) - Vec3::new(5.0, 0.0, 0.0)).norm() < 1e-12);
        // past the end: clamped to the endpoint
        assert!((m.point(12.0) - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((m.point(-1.0) - Vec3::zeros()).norm() < 1e-12);
    }

    #[test]
    fn test_zero_length_move() {
        let status = status_at(Vec3::new(1.0, 1.0, 1.0));
        let m = StraightMotion::from_status(&status, true);
        assert_eq!(m.length(), 0.0);
        assert!((m.point(0.0) - Vec3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_full_circle_length() {
        // spec §8 scenario 5: full circle, radius 10, Δz = 0, rot = +1
        let mut status = status_at(Vec3::new(10.0, 0.0, 0.0));
        let m = HelicalMotion::from_arc(10.0, 0.0, 0.0, 0.0, 1, 0.0, Vec3::zeros(), &mut status);
        assert!((m.length() - 2.0 * PI * 10.0).abs() < 1e-6);
        assert!((m.dtheta() - 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_full_circle_revisits_start_only_at_ends() {
        // S2
        let mut status = status_at(Vec3::new(10.0, 0.0, 0.0));
        let m = HelicalMotion::from_arc(10.0, 0.0, 0.0, 0.0, 1, 0.0, Vec3::zeros(), &mut status);
        let start = m.point(0.0);
        let end = m.point(m.length());
        assert!((start - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((end - start).norm() < 1e-9);
        // half-way is on the far side
        let mid = m.point(m.length() / 2.0);
        assert!((mid - Vec3::new(-10.0, 0.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_quarter_arc_ccw() {
        let mut status = status_at(Vec3::new(1.0, 0.0, 0.0));
        let m = HelicalMotion::from_arc(0.0, 1.0, 0.0, 0.0, 1, 0.0, Vec3::zeros(), &mut status);
        assert!((m.dtheta() - PI / 2.0).abs() < 1e-9);
        assert!((m.length() - PI / 2.0).abs() < 1e-9);
        let end = m.point(m.length());
        assert!((end - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_clockwise_arc() {
        let mut status = status_at(Vec3::new(1.0, 0.0, 0.0));
        let m = HelicalMotion::from_arc(0.0, -1.0, 0.0, 0.0, -1, 0.0, Vec3::zeros(), &mut status);
        assert!((m.dtheta() + PI / 2.0).abs() < 1e-9);
        let end = m.point(m.length());
        assert!((end - Vec3::new(0.0, -1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_multi_turn_helix() {
        // two full turns descending 2.0 in z
        let mut status = status_at(Vec3::new(1.0, 0.0, 0.0));
        let m = HelicalMotion::from_arc(1.0, 0.0, 0.0, 0.0, 2, -2.0, Vec3::zeros(), &mut status);
        assert!((m.dtheta() - 4.0 * PI).abs() < 1e-9);
        let c: f64 = 2.0 / (4.0 * PI);
        let expected = 4.0 * PI * (1.0 + c * c).sqrt();
        assert!((m.length() - expected).abs() < 1e-9);
        // z descends linearly with arc length
        let mid = m.point(m.length() / 2.0);
        assert!((mid.z + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_helix_in_xz_plane() {
        let mut status = status_at(Vec3::new(0.0, 0.0, 1.0));
        status.plane = Plane::Xz;
        // XZ plane: first coord is z, second is x, helix along y
        let m = HelicalMotion::from_arc(0.0, 1.0, 0.0, 0.0, 1, 0.0, Vec3::zeros(), &mut status);
        let end = m.point(m.length());
        assert!((end - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_user_origin_shifts_motion() {
        let origin = Pose::new(Vec3::new(100.0, 0.0, 0.0), Vec3::zeros());
        let mut status = MachineStatus::new(
            Pose::new(Vec3::new(10.0, 0.0, 0.0), Vec3::zeros()),
            origin,
        );
        let m = HelicalMotion::from_arc(10.0, 0.0, 0.0, 0.0, 1, 0.0, Vec3::zeros(), &mut status);
        let start = m.point(0.0);
        assert!((start - Vec3::new(110.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_rotational_length_dominates() {
        // pure orientation change at a 10-unit lever arm
        let mut status = status_at(Vec3::new(10.0, 0.0, 0.0));
        status.end_pose.loc = Vec3::new(10.0, 0.0, 0.0);
        status.end_pose.dir = Vec3::new(0.5, 0.0, 0.0);
        let m = StraightMotion::from_status(&status, false);
        assert!((m.length() - 5.0).abs() < 1e-12);
    }
}
