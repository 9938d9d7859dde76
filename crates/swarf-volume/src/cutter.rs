//! Cutting-tool volumes.
//!
//! A cutter is a stack of concentric annuli along the tool axis. Only the
//! flute band is supposed to remove material; the neck, shank and holder
//! bands are guarded regions whose contact with stock is a collision.
//!
//! Axial bands, measured from the tool tip (`z = 0`):
//!
//! ```text
//! [0, flute_length)               flute   (cutting)
//! [flute_length, reach_length)    neck    (guarded)
//! [reach_length, length)          shank   (guarded)
//! [length, length+holder_length)  holder  (guarded)
//! ```

use std::ops::{BitOr, BitOrAssign};

use swarf_math::{rotate_xz, Aabb, Point3, Vec3, GEOM_TOLERANCE};

use crate::Material;

/// Minimum penetration into a guarded region before a collision is
/// reported.
pub const COLLISION_TOLERANCE: f64 = 0.01;

/// Bit set of guarded regions (and protected material) hit by a cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionFlags(u32);

impl CollisionFlags {
    /// No collision.
    pub const NONE: Self = Self(0);
    /// Contact with the tool neck.
    pub const NECK: Self = Self(0x1_0000);
    /// Contact with the tool shank.
    pub const SHANK: Self = Self(0x2_0000);
    /// Contact with the tool holder.
    pub const HOLDER: Self = Self(0x4_0000);
    /// Material tagged as finished part was cut.
    pub const PARTS: Self = Self(0x8_0000);

    /// The collisions that force the simulation to pause.
    pub const HARD: Self = Self(Self::SHANK.0 | Self::HOLDER.0 | Self::PARTS.0);

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is set in `self`.
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Raw bit representation.
    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for CollisionFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CollisionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for CollisionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.intersects(Self::PARTS) {
            names.push("PARTS");
        }
        if self.intersects(Self::HOLDER) {
            names.push("HOLDER");
        }
        if self.intersects(Self::SHANK) {
            names.push("SHANK");
        }
        if self.intersects(Self::NECK) {
            names.push("NECK");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}

/// Result of classifying one point against a cutter.
#[derive(Debug, Clone, Copy)]
pub struct Cutting {
    /// Signed distance, positive inside the swept tool.
    pub f: f64,
    /// Guarded regions containing the point deeper than the collision
    /// tolerance.
    pub collision: CollisionFlags,
}

/// The flute shape of a cutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutterKind {
    /// Flat-bottomed cylindrical end mill.
    Cylinder,
    /// Ball-nose end mill: hemisphere of the tool radius at the tip.
    Ball,
}

/// A positioned cutting tool.
///
/// For ball cutters the stored `center` sits at the hemisphere centre,
/// `radius` above the tip, and the axial lengths are measured from there;
/// the constructors and setters apply the shift so callers always work in
/// tip-referenced dimensions.
#[derive(Debug, Clone)]
pub struct Cutter {
    /// Flute shape.
    pub kind: CutterKind,
    /// Flute radius.
    pub radius: f64,
    /// Cutter length up to the holder.
    pub length: f64,
    /// Length of the cutting flutes.
    pub flute_length: f64,
    /// Neck radius (between flute and reach).
    pub neck_radius: f64,
    /// Length below which the neck radius applies.
    pub reach_length: f64,
    /// Shank radius (between reach and holder).
    pub shank_radius: f64,
    /// Largest of flute/neck/shank radius, for the bounding box.
    pub max_radius: f64,
    /// Holder radius.
    pub holder_radius: f64,
    /// Holder length above the cutter.
    pub holder_length: f64,
    /// Whether the holder participates in bounds and collisions.
    pub holder_enabled: bool,
    /// Material stamped on cells cut by this tool.
    pub material: Material,
    center: Point3,
    angle: Vec3,
    bb: Aabb,
    bb_holder: Aabb,
}

impl Cutter {
    /// Create a cylindrical cutter from tip-referenced length and
    /// diameter. Flute and reach default to the full length, neck and
    /// shank to the flute radius.
    pub fn cylinder(length: f64, diameter: f64) -> Self {
        let radius = diameter * 0.5;
        let mut c = Self {
            kind: CutterKind::Cylinder,
            radius,
            length,
            flute_length: length,
            neck_radius: radius,
            reach_length: length,
            shank_radius: radius,
            max_radius: radius,
            holder_radius: 0.0,
            holder_length: 0.0,
            holder_enabled: false,
            material: Material::Cut,
            center: Point3::origin(),
            angle: Vec3::zeros(),
            bb: Aabb::new(),
            bb_holder: Aabb::new(),
        };
        c.calc_bb();
        c
    }

    /// Create a ball-nose cutter from tip-referenced length and diameter.
    pub fn ball(length: f64, diameter: f64) -> Self {
        let radius = diameter * 0.5;
        let axial = length - radius;
        let mut c = Self {
            kind: CutterKind::Ball,
            radius,
            length: axial,
            flute_length: axial,
            neck_radius: radius,
            reach_length: axial,
            shank_radius: radius,
            max_radius: radius,
            holder_radius: 0.0,
            holder_length: 0.0,
            holder_enabled: false,
            material: Material::Cut,
            center: Point3::origin(),
            angle: Vec3::zeros(),
            bb: Aabb::new(),
            bb_holder: Aabb::new(),
        };
        c.calc_bb();
        c
    }

    /// Set the flute length (tip-referenced).
    pub fn set_flute_length(&mut self, fl: f64) {
        self.flute_length = match self.kind {
            CutterKind::Cylinder => fl,
            CutterKind::Ball => fl - self.radius,
        };
    }

    /// Set the neck diameter.
    pub fn set_neck_diameter(&mut self, nd: f64) {
        self.neck_radius = nd * 0.5;
    }

    /// Set the reach length (tip-referenced).
    pub fn set_reach_length(&mut self, rl: f64) {
        self.reach_length = match self.kind {
            CutterKind::Cylinder => rl,
            CutterKind::Ball => rl - self.radius,
        };
    }

    /// Set the shank diameter; a shank wider than the flute widens the
    /// bounding box.
    pub fn set_shank_diameter(&mut self, sd: f64) {
        self.shank_radius = sd * 0.5;
        if self.shank_radius > self.max_radius {
            self.max_radius = self.shank_radius;
            self.calc_bb();
        }
    }

    /// Attach a holder of the given radius and length.
    pub fn set_holder(&mut self, radius: f64, length: f64) {
        self.holder_radius = radius;
        self.holder_length = length;
        self.holder_enabled = radius > 0.0 && length > 0.0;
        self.calc_bb();
    }

    /// Move the tool tip to `tip`.
    pub fn set_center(&mut self, tip: Point3) {
        self.center = match self.kind {
            CutterKind::Cylinder => tip,
            CutterKind::Ball => tip + Vec3::new(0.0, 0.0, self.radius),
        };
        self.calc_bb();
    }

    /// Set the A/C orientation in radians (multi-axis poses).
    pub fn set_angle(&mut self, a: f64, c: f64) {
        self.angle = Vec3::new(a, 0.0, c);
    }

    /// The stored centre (hemisphere centre for ball cutters).
    pub fn center(&self) -> Point3 {
        self.center
    }

    /// The current A/C orientation.
    pub fn angle(&self) -> Vec3 {
        self.angle
    }

    /// Bounding box of the cutter body.
    pub fn aabb(&self) -> &Aabb {
        &self.bb
    }

    /// Bounding box of the holder region.
    pub fn holder_aabb(&self) -> &Aabb {
        &self.bb_holder
    }

    /// Total tip-to-holder-top length, used for the machine's Z-limit
    /// offset.
    pub fn overall_length(&self) -> f64 {
        match self.kind {
            CutterKind::Cylinder => self.length,
            CutterKind::Ball => self.length + self.radius,
        }
    }

    fn calc_bb(&mut self) {
        let r = self.max_radius + GEOM_TOLERANCE;
        let bottom = match self.kind {
            CutterKind::Cylinder => self.center.z - GEOM_TOLERANCE,
            CutterKind::Ball => self.center.z - self.radius - GEOM_TOLERANCE,
        };
        self.bb.clear();
        self.bb
            .add_point(Point3::new(self.center.x + r, self.center.y + r, bottom));
        self.bb.add_point(Point3::new(
            self.center.x - r,
            self.center.y - r,
            self.center.z + self.length + GEOM_TOLERANCE,
        ));
        if self.holder_enabled {
            let hr = self.holder_radius + GEOM_TOLERANCE;
            self.bb_holder.clear();
            self.bb_holder.add_point(Point3::new(
                self.center.x + hr,
                self.center.y + hr,
                self.center.z + self.length + self.holder_length + GEOM_TOLERANCE,
            ));
            self.bb_holder.add_point(Point3::new(
                self.center.x - hr,
                self.center.y - hr,
                self.center.z + self.length - GEOM_TOLERANCE,
            ));
        }
    }

    /// Query point transformed into the tool frame: A/C rotation first,
    /// then translation to the tool centre.
    fn tool_frame(&self, p: Point3) -> Vec3 {
        if self.angle.x != 0.0 || self.angle.z != 0.0 {
            rotate_xz(p.coords, self.angle.x, self.angle.z) - self.center.coords
        } else {
            p - self.center
        }
    }

    /// Signed distance, positive inside the tool (holder included above
    /// `length`).
    pub fn dist(&self, p: Point3) -> f64 {
        let t = self.tool_frame(p);
        match self.kind {
            CutterKind::Cylinder => {
                let d = Vec3::new(t.x, t.y, 0.0).norm();
                if t.z >= 0.0 {
                    if t.z > self.length {
                        self.holder_radius - d
                    } else {
                        self.radius - d
                    }
                } else if d < self.radius {
                    // under the cutter: distance to the flat tip
                    t.z
                } else {
                    // distance to the tip rim
                    let n = Vec3::new(t.x, t.y, 0.0) * (self.radius / d);
                    -(t - n).norm()
                }
            }
            CutterKind::Ball => {
                if t.z < 0.0 {
                    self.radius - t.norm()
                } else {
                    self.radius - Vec3::new(t.x, t.y, 0.0).norm()
                }
            }
        }
    }

    /// Signed distance plus guarded-region classification.
    ///
    /// The effective radius grows with height through the neck, shank and
    /// holder bands; penetration deeper than [`COLLISION_TOLERANCE`] into
    /// a guarded band raises the matching flag.
    pub fn classify(&self, p: Point3) -> Cutting {
        let t = self.tool_frame(p);
        let d = Vec3::new(t.x, t.y, 0.0).norm();
        let mut result = Cutting {
            f: 0.0,
            collision: CollisionFlags::NONE,
        };

        if t.z < 0.0 {
            match self.kind {
                CutterKind::Cylinder => {
                    if d < self.radius {
                        result.f = t.z;
                    } else {
                        let n = Vec3::new(t.x, t.y, 0.0) * (self.radius / d);
                        result.f = -(t - n).norm();
                    }
                }
                CutterKind::Ball => {
                    result.f = self.radius - t.norm();
                }
            }
            return result;
        }

        let mut rdiff = self.radius - d;
        if t.z > self.flute_length {
            rdiff = self.neck_radius - d;
            if rdiff > COLLISION_TOLERANCE {
                result.collision |= CollisionFlags::NECK;
            }
        }
        if t.z > self.reach_length {
            rdiff = self.shank_radius - d;
            if rdiff > COLLISION_TOLERANCE {
                result.collision |= CollisionFlags::SHANK;
            }
        }
        if t.z > self.length {
            rdiff = self.holder_radius - d;
            if rdiff > COLLISION_TOLERANCE {
                result.collision |= CollisionFlags::HOLDER;
            }
        }
        result.f = match self.kind {
            CutterKind::Cylinder => rdiff.min(t.z),
            CutterKind::Ball => rdiff,
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> Cutter {
        // 2mm radius flute for 10mm, neck to 20mm, shank to 30mm, holder above
        let mut c = Cutter::cylinder(30.0, 4.0);
        c.set_flute_length(10.0);
        c.set_neck_diameter(3.0);
        c.set_reach_length(20.0);
        c.set_shank_diameter(3.5);
        c.set_holder(10.0, 15.0);
        c.set_center(Point3::origin());
        c
    }

    #[test]
    fn test_flags_display() {
        let f = CollisionFlags::HOLDER | CollisionFlags::PARTS;
        assert_eq!(format!("{f}"), "PARTS+HOLDER");
        assert!(f.intersects(CollisionFlags::HARD));
        assert!(!CollisionFlags::NECK.intersects(CollisionFlags::HARD));
    }

    #[test]
    fn test_cylinder_cutter_flute_cut_no_collision() {
        let c = tool();
        // inside the flute band, inside the radius
        let r = c.classify(Point3::new(1.0, 0.0, 5.0));
        assert!(r.f > 0.0);
        assert!(r.collision.is_empty());
    }

    #[test]
    fn test_cylinder_cutter_neck_collision() {
        let c = tool();
        // inside the neck band, within the neck radius
        let r = c.classify(Point3::new(0.5, 0.0, 15.0));
        assert!(r.collision.intersects(CollisionFlags::NECK));
        assert!(!r.collision.intersects(CollisionFlags::SHANK));
    }

    #[test]
    fn test_cylinder_cutter_shank_and_holder_collision() {
        let c = tool();
        let r = c.classify(Point3::new(0.5, 0.0, 25.0));
        assert!(r.collision.intersects(CollisionFlags::SHANK));
        let r = c.classify(Point3::new(3.0, 0.0, 40.0));
        assert!(r.collision.intersects(CollisionFlags::HOLDER));
    }

    #[test]
    fn test_cylinder_cutter_outside_no_collision() {
        let c = tool();
        // outside the holder radius above the tool
        let r = c.classify(Point3::new(12.0, 0.0, 40.0));
        assert!(r.collision.is_empty());
        assert!(r.f < 0.0);
    }

    #[test]
    fn test_cutter_below_tip() {
        let c = tool();
        let r = c.classify(Point3::new(0.0, 0.0, -1.0));
        assert!(r.collision.is_empty());
        assert!((r.f + 1.0).abs() < 1e-12);
        // off to the side below the tip: rim distance
        let r = c.classify(Point3::new(4.0, 0.0, -1.0));
        assert!(r.f < 0.0);
    }

    #[test]
    fn test_ball_cutter_tip_is_sphere() {
        let mut c = Cutter::ball(20.0, 4.0);
        c.set_center(Point3::origin());
        // the tip itself is on the surface
        assert!(c.dist(Point3::origin()).abs() < 1e-12);
        // a point 1mm above the tip on the axis is 1mm deep... into the
        // hemisphere whose centre sits radius above the tip
        assert!((c.dist(Point3::new(0.0, 0.0, 1.0)) - 1.0).abs() < 1e-12);
        // sideways at the hemisphere equator
        assert!(c.dist(Point3::new(2.0, 0.0, 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ball_cutter_lengths_are_tip_referenced() {
        let c = Cutter::ball(20.0, 4.0);
        assert!((c.length - 18.0).abs() < 1e-12);
        assert!((c.overall_length() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_cutter_aabb_tracks_position() {
        let mut c = Cutter::cylinder(10.0, 2.0);
        c.set_center(Point3::new(5.0, 5.0, 1.0));
        assert!(c.aabb().contains_point(Point3::new(5.0, 5.0, 6.0)));
        assert!(!c.aabb().contains_point(Point3::new(5.0, 5.0, 12.0)));
    }

    #[test]
    fn test_holder_aabb() {
        let c = tool();
        assert!(c.holder_aabb().contains_point(Point3::new(0.0, 0.0, 40.0)));
        assert!(!c.holder_aabb().contains_point(Point3::new(0.0, 0.0, 5.0)));
    }
}
