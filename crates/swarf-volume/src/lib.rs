#![warn(missing_docs)]

//! Implicit solid volumes for the swarf cutting-simulation kernel.
//!
//! A volume is a signed distance function `dist(p)` returning a positive
//! value inside the solid and a negative value outside. The sign convention
//! means boolean operations on distance fields reduce to min/max:
//!
//! - union:     `max(d(A), d(B))`
//! - subtract:  `min(d(A), -d(B))`
//! - intersect: `min(d(A), d(B))`
//!
//! `|dist(p)|` is not required to be the exact Euclidean distance, only a
//! monotone proxy whose zero set is the surface.
//!
//! Stock and part shapes are the closed set in [`Volume`]; cutting tools
//! live in [`Cutter`], which adds the guarded-region classification used
//! for collision detection.

mod cutter;
mod primitives;
mod stl;

pub use cutter::{Cutter, CutterKind, Cutting, CollisionFlags};
pub use primitives::{Cylinder, Rect, Sphere, Volume};
pub use stl::{Facet, StlSolid};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from volume construction and STL loading.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// STL file could not be read.
    #[error("failed to read STL file: {0}")]
    Io(#[from] std::io::Error),

    /// STL file is not valid ASCII or binary STL.
    #[error("malformed STL file: {0}")]
    MalformedStl(String),

    /// A dimension that must be positive was not.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
}

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

/// What kind of material a volume (and the octree cells it touches)
/// represents.
///
/// Replaces sentinel-colour comparisons with an explicit tag; the renderer
/// colour is derived from the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Material {
    /// Removable stock material.
    Stock,
    /// Finished-part material; cutting it is a collision.
    Parts,
    /// Surface freshly cut by the tool.
    Cut,
    /// Surface involved in a collision.
    Collision,
}

impl Material {
    /// RGB colour used when meshing cells of this material.
    pub fn color(&self) -> [f32; 3] {
        match self {
            Material::Stock => [0.1, 0.65, 0.15],
            Material::Parts => [0.5, 0.5, 0.5],
            Material::Cut => [0.85, 0.75, 0.1],
            Material::Collision => [0.9, 0.1, 0.1],
        }
    }
}
