//! Triangle-soup solids loaded from STL files.
//!
//! The signed distance of a point is the smallest-magnitude signed
//! distance over all facets, where each facet classifies the point against
//! its face plane, edges and vertices, and the sign comes from the facet
//! normal. Works for closed meshes with outward normals.

use std::fs;
use std::path::Path;

use swarf_math::{rotate_about_axis, rotate_xz, Aabb, Point3, Vec3, GEOM_TOLERANCE};

use crate::{Material, Result, VolumeError};

/// One STL facet: a normal and three vertices.
#[derive(Debug, Clone, Copy)]
pub struct Facet {
    /// Outward facet normal.
    pub normal: Vec3,
    /// The three corner vertices.
    pub v: [Point3; 3],
}

impl Facet {
    /// Create a facet.
    pub fn new(normal: Vec3, v1: Point3, v2: Point3, v3: Point3) -> Self {
        Self {
            normal,
            v: [v1, v2, v3],
        }
    }
}

/// A solid defined by an STL triangle soup.
///
/// Placement (centre offset, rotation about a rotation centre) is baked
/// into the facets once by [`StlSolid::place`], which also precomputes the
/// per-facet edge vectors and inverse squared edge lengths used by the
/// distance query's inner loop.
#[derive(Debug, Clone)]
pub struct StlSolid {
    /// The placed facets.
    pub facets: Vec<Facet>,
    /// Material stamped on modified cells.
    pub material: Material,
    pub(crate) bb: Aabb,
    // per-facet edge vectors v2-v1, v3-v2, v1-v3 and 1/<e,e>
    e21: Vec<Vec3>,
    inv_e21: Vec<f64>,
    e32: Vec<Vec3>,
    inv_e32: Vec<f64>,
    e13: Vec<Vec3>,
    inv_e13: Vec<f64>,
}

impl StlSolid {
    /// Build a solid from raw facets (already in their final pose).
    pub fn from_facets(facets: Vec<Facet>, material: Material) -> Self {
        let mut s = Self {
            facets,
            material,
            bb: Aabb::new(),
            e21: Vec::new(),
            inv_e21: Vec::new(),
            e32: Vec::new(),
            inv_e32: Vec::new(),
            e13: Vec::new(),
            inv_e13: Vec::new(),
        };
        s.precompute();
        s
    }

    /// Read an STL file (ASCII or binary) without placement.
    pub fn read_file(path: &Path, material: Material) -> Result<Self> {
        let bytes = fs::read(path)?;
        let facets = parse_stl(&bytes)?;
        log::debug!("read {} facets from {}", facets.len(), path.display());
        Ok(Self::from_facets(facets, material))
    }

    /// Apply placement: offset every vertex by `center`, then rotate
    /// vertices and normals about `rotation_center` by `(angle.x, angle.z)`.
    /// Recomputes the cached edge data and bounding box.
    pub fn place(&mut self, center: Vec3, rotation_center: Point3, angle: Vec3) {
        for f in &mut self.facets {
            f.normal = rotate_xz(f.normal, angle.x, angle.z);
            for v in &mut f.v {
                let moved = *v + center;
                let r = rotate_about_axis(moved, rotation_center, Vec3::x(), angle.x);
                *v = rotate_about_axis(r, rotation_center, Vec3::z(), angle.z);
            }
        }
        self.precompute();
    }

    fn precompute(&mut self) {
        self.e21.clear();
        self.inv_e21.clear();
        self.e32.clear();
        self.inv_e32.clear();
        self.e13.clear();
        self.inv_e13.clear();
        self.bb.clear();
        for f in &self.facets {
            let e21 = f.v[1] - f.v[0];
            let e32 = f.v[2] - f.v[1];
            let e13 = f.v[0] - f.v[2];
            self.inv_e21.push(1.0 / e21.dot(&e21));
            self.inv_e32.push(1.0 / e32.dot(&e32));
            self.inv_e13.push(1.0 / e13.dot(&e13));
            self.e21.push(e21);
            self.e32.push(e32);
            self.e13.push(e13);
            for v in f.v {
                self.bb.add_point(v);
            }
        }
        if !self.bb.is_empty() {
            let margin = Vec3::new(GEOM_TOLERANCE, GEOM_TOLERANCE, GEOM_TOLERANCE);
            let (min, max) = (self.bb.min(), self.bb.max());
            self.bb.add_point(max + margin);
            self.bb.add_point(min - margin);
        }
    }

    /// Signed distance, positive inside: the smallest-magnitude signed
    /// distance across all facets.
    pub fn dist(&self, p: Point3) -> f64 {
        let tol = GEOM_TOLERANCE;
        let mut min = 1.0e3;
        let mut ret = -1.0;
        for (i, facet) in self.facets.iter().enumerate() {
            let u = (p - facet.v[0]).dot(&self.e21[i]) * self.inv_e21[i];
            let q = facet.v[0] + self.e21[i] * u;
            let d = (q - p).dot(&facet.normal);
            if d.abs() > min {
                continue;
            }
            // project onto the facet plane and classify against the edges
            let r = p + facet.normal * d;
            let n1 = (r - facet.v[0]).cross(&self.e13[i]);
            let n2 = (r - facet.v[1]).cross(&self.e21[i]);
            let n3 = (r - facet.v[2]).cross(&self.e32[i]);
            let s12 = n1.dot(&n2);
            let s23 = n2.dot(&n3);
            let s31 = n3.dot(&n1);

            if s12 * s31 > 0.0 && s12 * s23 > 0.0 && s23 * s31 > 0.0 {
                // face interior
                if d.abs() < min {
                    min = d.abs();
                    ret = d;
                }
                continue;
            }

            // nearest feature is an edge or one of its endpoints
            let q = if s12 <= 0.0 && s31 >= 0.0 {
                if u > 0.0 && u < 1.0 {
                    q
                } else if u <= 0.0 {
                    facet.v[0]
                } else {
                    facet.v[1]
                }
            } else if s31 <= 0.0 && s23 >= 0.0 {
                let u = (p - facet.v[2]).dot(&self.e13[i]) * self.inv_e13[i];
                if u > 0.0 && u < 1.0 {
                    facet.v[2] + self.e13[i] * u
                } else if u <= 0.0 {
                    facet.v[2]
                } else {
                    facet.v[0]
                }
            } else if s23 <= 0.0 && s12 >= 0.0 {
                let u = (p - facet.v[1]).dot(&self.e32[i]) * self.inv_e32[i];
                if u > 0.0 && u < 1.0 {
                    facet.v[1] + self.e32[i] * u
                } else if u <= 0.0 {
                    facet.v[1]
                } else {
                    facet.v[2]
                }
            } else {
                continue;
            };
            let abs_d = (q - p).norm();
            if abs_d < min {
                // sign from which side of the facet the point is on; the
                // small bias keeps convex-edge answers stable against the
                // coplanar face of the neighbouring facet
                let d = (q - p).dot(&facet.normal);
                if d > tol {
                    min = abs_d + tol;
                    ret = abs_d;
                } else {
                    min = abs_d;
                    ret = -abs_d;
                }
            }
        }
        ret
    }
}

/// Parse STL bytes, auto-detecting ASCII vs binary.
fn parse_stl(bytes: &[u8]) -> Result<Vec<Facet>> {
    if bytes.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if text.contains("facet") {
                return parse_ascii_stl(text);
            }
        }
    }
    parse_binary_stl(bytes)
}

fn parse_ascii_stl(text: &str) -> Result<Vec<Facet>> {
    let mut facets = Vec::new();
    let mut normal = Vec3::zeros();
    let mut verts: Vec<Point3> = Vec::with_capacity(3);
    for (lineno, line) in text.lines().enumerate() {
        let mut tok = line.split_whitespace();
        match tok.next() {
            Some("facet") => {
                // facet normal nx ny nz
                let _ = tok.next();
                normal = Vec3::new(
                    parse_coord(tok.next(), lineno)?,
                    parse_coord(tok.next(), lineno)?,
                    parse_coord(tok.next(), lineno)?,
                );
                verts.clear();
            }
            Some("vertex") => {
                verts.push(Point3::new(
                    parse_coord(tok.next(), lineno)?,
                    parse_coord(tok.next(), lineno)?,
                    parse_coord(tok.next(), lineno)?,
                ));
            }
            Some("endfacet") => {
                if verts.len() != 3 {
                    return Err(VolumeError::MalformedStl(format!(
                        "facet ending at line {} has {} vertices",
                        lineno + 1,
                        verts.len()
                    )));
                }
                facets.push(Facet::new(normal, verts[0], verts[1], verts[2]));
            }
            _ => {}
        }
    }
    if facets.is_empty() {
        return Err(VolumeError::MalformedStl("no facets found".into()));
    }
    Ok(facets)
}

fn parse_coord(tok: Option<&str>, lineno: usize) -> Result<f64> {
    tok.and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| VolumeError::MalformedStl(format!("bad coordinate at line {}", lineno + 1)))
}

fn parse_binary_stl(bytes: &[u8]) -> Result<Vec<Facet>> {
    if bytes.len() < 84 {
        return Err(VolumeError::MalformedStl("file too short".into()));
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let expected = 84 + count * 50;
    if bytes.len() < expected {
        return Err(VolumeError::MalformedStl(format!(
            "expected {} facets but file holds fewer",
            count
        )));
    }
    let mut facets = Vec::with_capacity(count);
    for i in 0..count {
        let rec = &bytes[84 + i * 50..84 + i * 50 + 50];
        let f = |off: usize| {
            f32::from_le_bytes([rec[off], rec[off + 1], rec[off + 2], rec[off + 3]]) as f64
        };
        facets.push(Facet::new(
            Vec3::new(f(0), f(4), f(8)),
            Point3::new(f(12), f(16), f(20)),
            Point3::new(f(24), f(28), f(32)),
            Point3::new(f(36), f(40), f(44)),
        ));
    }
    Ok(facets)
}
