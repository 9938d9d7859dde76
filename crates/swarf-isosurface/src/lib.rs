#![warn(missing_docs)]

//! Incremental iso-surface extraction for the swarf octree.
//!
//! Extractors read the distance field stored at octree cell corners and
//! keep the geometry buffer's work side in sync with it. Traversal starts
//! at the root and short-circuits any subtree whose mesh-validity flag is
//! still set, so only cells touched by the last CSG operation are
//! re-meshed: each invalid leaf first releases its previous vertices
//! (cascading polygon removal in the buffer), regenerates its output, and
//! is then marked valid again.

mod marching_cubes;
mod tables;
mod wireframe;

pub use marching_cubes::MarchingCubes;
pub use tables::{EDGE_TABLE, EDGE_VERTICES, TRI_TABLE};
pub use wireframe::CubeWireframe;

use swarf_mesh::GeometryBuffer;
use swarf_octree::Octree;

/// An iso-surface extraction algorithm over the octree.
pub trait IsoSurface {
    /// Re-mesh every invalid cell into the buffer's work side.
    fn update_mesh(&self, tree: &mut Octree, buf: &mut GeometryBuffer);
}
