//! Stock and part volume primitives: sphere, rotated box, rotated
//! cylinder, and triangle-soup solids loaded from STL.

use swarf_math::{rotate_about_axis, rotate_xz_inv, Aabb, Point3, Vec3, GEOM_TOLERANCE};

use crate::{Material, StlSolid};

/// A solid shape used as stock or part geometry.
///
/// The volume set is closed and small, so this is a tagged enum with a
/// single `dist` entry point rather than open-ended trait objects.
#[derive(Debug, Clone)]
pub enum Volume {
    /// Sphere at a centre point.
    Sphere(Sphere),
    /// Box, optionally rotated about a rotation centre.
    Rect(Rect),
    /// Finite cylinder along local Z, optionally rotated.
    Cylinder(Cylinder),
    /// Triangle-soup solid loaded from an STL file.
    Stl(StlSolid),
}

impl Volume {
    /// Signed distance from `p` to the volume surface: positive inside.
    pub fn dist(&self, p: Point3) -> f64 {
        match self {
            Volume::Sphere(s) => s.dist(p),
            Volume::Rect(r) => r.dist(p),
            Volume::Cylinder(c) => c.dist(p),
            Volume::Stl(s) => s.dist(p),
        }
    }

    /// Bounding box of the interior (where `dist` is positive).
    pub fn aabb(&self) -> &Aabb {
        match self {
            Volume::Sphere(s) => &s.bb,
            Volume::Rect(r) => &r.bb,
            Volume::Cylinder(c) => &c.bb,
            Volume::Stl(s) => &s.bb,
        }
    }

    /// The material this volume stamps onto cells it modifies.
    pub fn material(&self) -> Material {
        match self {
            Volume::Sphere(s) => s.material,
            Volume::Rect(r) => r.material,
            Volume::Cylinder(c) => c.material,
            Volume::Stl(s) => s.material,
        }
    }
}

impl From<Sphere> for Volume {
    fn from(s: Sphere) -> Self {
        Volume::Sphere(s)
    }
}

impl From<Rect> for Volume {
    fn from(r: Rect) -> Self {
        Volume::Rect(r)
    }
}

impl From<Cylinder> for Volume {
    fn from(c: Cylinder) -> Self {
        Volume::Cylinder(c)
    }
}

impl From<StlSolid> for Volume {
    fn from(s: StlSolid) -> Self {
        Volume::Stl(s)
    }
}

/// Sphere with centre and radius.
#[derive(Debug, Clone)]
pub struct Sphere {
    /// Centre point.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Material stamped on modified cells.
    pub material: Material,
    pub(crate) bb: Aabb,
}

impl Sphere {
    /// Create a sphere.
    pub fn new(center: Point3, radius: f64, material: Material) -> Self {
        let mut s = Self {
            center,
            radius,
            material,
            bb: Aabb::new(),
        };
        s.calc_bb();
        s
    }

    fn calc_bb(&mut self) {
        self.bb.clear();
        let r = Vec3::new(self.radius, self.radius, self.radius);
        self.bb.add_point(self.center + r);
        self.bb.add_point(self.center - r);
    }

    /// `radius − ‖p − c‖`, positive inside.
    pub fn dist(&self, p: Point3) -> f64 {
        self.radius - (self.center - p).norm()
    }
}

/// Axis-aligned box spanned from a corner by width (x), length (y) and
/// height (z), rotated about `rotation_center` by Tait–Bryan angles
/// `(alpha, 0, gamma)`.
#[derive(Debug, Clone)]
pub struct Rect {
    /// The minimum corner of the unrotated box.
    pub corner: Point3,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub length: f64,
    /// Extent along z.
    pub height: f64,
    /// Centre of rotation.
    pub rotation_center: Point3,
    /// Rotation about X (`x`) and Z (`z`) in radians; `y` is unused.
    pub angle: Vec3,
    /// Material stamped on modified cells.
    pub material: Material,
    pub(crate) bb: Aabb,
}

impl Rect {
    /// Create a box from its minimum corner.
    pub fn from_corner(corner: Point3, width: f64, length: f64, height: f64) -> Self {
        let mut r = Self {
            corner,
            width,
            length,
            height,
            rotation_center: Point3::origin(),
            angle: Vec3::zeros(),
            material: Material::Stock,
            bb: Aabb::new(),
        };
        r.calc_bb();
        r
    }

    /// Create a box from the centre of its bottom face.
    pub fn from_center(center: Point3, width: f64, length: f64, height: f64) -> Self {
        let corner = Point3::new(center.x - width * 0.5, center.y - length * 0.5, center.z);
        Self::from_corner(corner, width, length, height)
    }

    /// Set the material tag.
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Set rotation centre and angles, then refit the bounding box.
    pub fn with_rotation(mut self, rotation_center: Point3, angle: Vec3) -> Self {
        self.rotation_center = rotation_center;
        self.angle = angle;
        self.calc_bb();
        self
    }

    /// Refit the bounding box from the eight rotated corners.
    pub fn calc_bb(&mut self) {
        let c = self.corner;
        let (w, l, h) = (self.width, self.length, self.height);
        let corners = [
            c,
            c + Vec3::new(w, 0.0, 0.0),
            c + Vec3::new(0.0, l, 0.0),
            c + Vec3::new(w, l, 0.0),
            c + Vec3::new(0.0, 0.0, h),
            c + Vec3::new(w, 0.0, h),
            c + Vec3::new(0.0, l, h),
            c + Vec3::new(w, l, h),
        ];
        self.bb.clear();
        let margin = Vec3::new(GEOM_TOLERANCE, GEOM_TOLERANCE, GEOM_TOLERANCE);
        for p in corners {
            let p = rotate_about_axis(p, self.rotation_center, Vec3::x(), self.angle.x);
            let p = rotate_about_axis(p, self.rotation_center, Vec3::z(), self.angle.z);
            self.bb.add_point(p + margin);
            self.bb.add_point(p - margin);
        }
    }

    /// Signed distance, positive inside.
    pub fn dist(&self, p: Point3) -> f64 {
        // into the box frame: undo the solid's rotation
        let q = self.rotation_center
            + rotate_xz_inv(p - self.rotation_center, self.angle.x, self.angle.z);
        let min = self.corner;
        let max = self.corner + Vec3::new(self.width, self.length, self.height);
        // per-axis overflow: zero inside the slab, distance past a face outside
        let ex = (min.x - q.x).max(q.x - max.x).max(0.0);
        let ey = (min.y - q.y).max(q.y - max.y).max(0.0);
        let ez = (min.z - q.z).max(q.z - max.z).max(0.0);
        if ex == 0.0 && ey == 0.0 && ez == 0.0 {
            // inside: distance to the nearest of the six slabs
            let dx = (q.x - min.x).min(max.x - q.x);
            let dy = (q.y - min.y).min(max.y - q.y);
            let dz = (q.z - min.z).min(max.z - q.z);
            dx.min(dy).min(dz)
        } else {
            // outside: Euclidean distance to the face, edge, or corner region
            -(ex * ex + ey * ey + ez * ez).sqrt()
        }
    }
}

/// Finite cylinder with its base disc at `center`, extending `length`
/// along local Z, rotated about `rotation_center` by `(alpha, 0, gamma)`.
#[derive(Debug, Clone)]
pub struct Cylinder {
    /// Centre of the bottom disc.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Height along local Z.
    pub length: f64,
    /// Centre of rotation.
    pub rotation_center: Point3,
    /// Rotation about X (`x`) and Z (`z`) in radians.
    pub angle: Vec3,
    /// Material stamped on modified cells.
    pub material: Material,
    pub(crate) bb: Aabb,
}

impl Cylinder {
    /// Create an unrotated cylinder.
    pub fn new(center: Point3, radius: f64, length: f64) -> Self {
        let mut c = Self {
            center,
            radius,
            length,
            rotation_center: Point3::origin(),
            angle: Vec3::zeros(),
            material: Material::Stock,
            bb: Aabb::new(),
        };
        c.calc_bb();
        c
    }

    /// Set the material tag.
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Set rotation centre and angles, then refit the bounding box.
    pub fn with_rotation(mut self, rotation_center: Point3, angle: Vec3) -> Self {
        self.rotation_center = rotation_center;
        self.angle = angle;
        self.calc_bb();
        self
    }

    /// Refit the bounding box from the rotated extremes.
    pub fn calc_bb(&mut self) {
        let r = self.radius;
        let corners = [
            self.center + Vec3::new(r, r, 0.0),
            self.center + Vec3::new(-r, r, 0.0),
            self.center + Vec3::new(-r, -r, 0.0),
            self.center + Vec3::new(r, -r, 0.0),
            self.center + Vec3::new(r, r, self.length),
            self.center + Vec3::new(-r, r, self.length),
            self.center + Vec3::new(-r, -r, self.length),
            self.center + Vec3::new(r, -r, self.length),
        ];
        self.bb.clear();
        let margin = Vec3::new(GEOM_TOLERANCE, GEOM_TOLERANCE, GEOM_TOLERANCE);
        for p in corners {
            let p = rotate_about_axis(p, self.rotation_center, Vec3::x(), self.angle.x);
            let p = rotate_about_axis(p, self.rotation_center, Vec3::z(), self.angle.z);
            self.bb.add_point(p + margin);
            self.bb.add_point(p - margin);
        }
    }

    /// Signed distance, positive inside.
    pub fn dist(&self, p: Point3) -> f64 {
        let q = self.rotation_center
            + rotate_xz_inv(p - self.rotation_center, self.angle.x, self.angle.z);
        let tb = q - self.center;
        let tt = q - (self.center + Vec3::new(0.0, 0.0, self.length));
        let d = Vec3::new(tb.x, tb.y, 0.0).norm();

        if tb.z >= 0.0 && tt.z <= 0.0 {
            // inside the height band: nearest of wall, bottom cap, top cap
            (self.radius - d).min(tb.z).min(-tt.z)
        } else if tb.z < 0.0 {
            if d < self.radius {
                // under the cylinder: distance to the flat bottom
                tb.z
            } else {
                // distance to the lower rim
                let n = Vec3::new(tb.x, tb.y, 0.0) * (self.radius / d);
                -(tb - n).norm()
            }
        } else if d < self.radius {
            // above the cylinder: distance to the flat top
            -tt.z
        } else {
            // distance to the upper rim
            let n = Vec3::new(tt.x, tt.y, 0.0) * (self.radius / d);
            -(tt - n).norm()
        }
    }
}
