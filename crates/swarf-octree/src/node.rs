//! Octree cell data.

use std::collections::BTreeSet;

use swarf_math::{Aabb, Point3, Vec3};
use swarf_mesh::CellKey;
use swarf_volume::Material;

/// Classification of a cell against the distance field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Every corner sample is inside (`f ≥ 0`).
    Inside,
    /// Every corner sample is outside (`f < 0`).
    Outside,
    /// Mixed corner signs; the surface passes through this cell.
    Undecided,
}

/// Direction from a cell centre to each of its eight corners, which is
/// also the offset direction of the child cell with the same index.
///
/// The ordering is fixed and shared with the iso-surface tables.
pub const CORNER_DIRECTIONS: [[f64; 3]; 8] = [
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
];

/// One cell of the octree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Cell centre.
    pub center: Point3,
    /// Distance from the centre to a corner along one axis (half the cube
    /// side).
    pub scale: f64,
    /// Depth below the root (root is 0).
    pub depth: u8,
    /// Octant index of this cell in its parent, `0..8`.
    pub idx: u8,
    /// Parent cell, `None` for the root.
    pub parent: Option<CellKey>,
    /// The eight children; a cell has none or all of them.
    pub children: Option<[CellKey; 8]>,
    /// Corner distance samples in [`CORNER_DIRECTIONS`] order, positive
    /// inside the stock.
    pub f: [f64; 8],
    /// Current classification; in sync with `f` at op boundaries.
    pub state: NodeState,
    /// Classification before the last transition to `Undecided`; children
    /// created by subdivision seed their corners from this.
    pub prev_state: NodeState,
    /// Material of the volume that last dominated this cell's corners.
    pub material: Material,
    /// Cube bound, enlarged in multi-axis mode so rotated cutters cannot
    /// slip past the overlap test.
    pub aabb: Aabb,
    pub(crate) mesh_valid: bool,
    pub(crate) child_valid_mask: u8,
    pub(crate) vertex_ids: BTreeSet<u32>,
}

impl Node {
    pub(crate) fn new(
        center: Point3,
        scale: f64,
        depth: u8,
        idx: u8,
        parent: Option<CellKey>,
        state: NodeState,
        prev_state: NodeState,
        f: [f64; 8],
        material: Material,
        multi_axis: bool,
    ) -> Self {
        let mut aabb = Aabb::new();
        if multi_axis {
            // rotated cutters sweep a larger region through a cell
            aabb.add_point(center + Vec3::new(-2.0, -2.0, -2.0) * scale);
            aabb.add_point(center + Vec3::new(2.0, 2.0, 2.0) * scale);
        } else {
            aabb.add_point(center + Vec3::new(-1.0, -1.0, -1.0) * scale);
            aabb.add_point(center + Vec3::new(1.0, 1.0, 1.0) * scale);
        }
        Self {
            center,
            scale,
            depth,
            idx,
            parent,
            children: None,
            f,
            state,
            prev_state,
            material,
            aabb,
            mesh_valid: false,
            child_valid_mask: 0,
            vertex_ids: BTreeSet::new(),
        }
    }

    /// Position of corner `n` in [`CORNER_DIRECTIONS`] order.
    pub fn corner(&self, n: usize) -> Point3 {
        let d = CORNER_DIRECTIONS[n];
        self.center + Vec3::new(d[0], d[1], d[2]) * self.scale
    }

    /// All eight corner positions.
    pub fn corners(&self) -> [Point3; 8] {
        std::array::from_fn(|n| self.corner(n))
    }

    /// Centre of the child cell with octant index `n`.
    pub fn child_center(&self, n: usize) -> Point3 {
        let d = CORNER_DIRECTIONS[n];
        self.center + Vec3::new(d[0], d[1], d[2]) * (0.5 * self.scale)
    }

    /// True if this cell has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// True if the mesh output for this cell is up to date with `f`.
    pub fn is_valid(&self) -> bool {
        self.mesh_valid
    }

    /// Mesh vertex ids this cell currently contributes.
    pub fn vertex_ids(&self) -> &BTreeSet<u32> {
        &self.vertex_ids
    }

    /// Derive the state the corner signs imply. Returns `(current,
    /// derived)`.
    pub(crate) fn classify(&self) -> (NodeState, NodeState) {
        let old = self.state;
        let inside = self.f.iter().all(|&v| v >= 0.0);
        let outside = self.f.iter().all(|&v| v < 0.0);
        let new = if inside {
            NodeState::Inside
        } else if outside {
            NodeState::Outside
        } else {
            NodeState::Undecided
        };
        (old, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(f: [f64; 8]) -> Node {
        Node::new(
            Point3::origin(),
            1.0,
            0,
            0,
            None,
            NodeState::Undecided,
            NodeState::Outside,
            f,
            Material::Stock,
            false,
        )
    }

    #[test]
    fn test_corner_order() {
        let n = leaf([-1.0; 8]);
        assert_eq!(n.corner(0), Point3::new(1.0, 1.0, -1.0));
        assert_eq!(n.corner(2), Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(n.corner(4), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(n.corner(6), Point3::new(-1.0, -1.0, 1.0));
    }

    #[test]
    fn test_corner_2_and_4_are_extremes() {
        let n = leaf([-1.0; 8]);
        assert_eq!(n.corner(2), n.aabb.min());
        assert_eq!(n.corner(4), n.aabb.max());
    }

    #[test]
    fn test_classify() {
        let mut n = leaf([1.0; 8]);
        assert_eq!(n.classify().1, NodeState::Inside);
        n.f = [-1.0; 8];
        assert_eq!(n.classify().1, NodeState::Outside);
        n.f[3] = 0.5;
        assert_eq!(n.classify().1, NodeState::Undecided);
        // f = 0 counts as inside
        n.f = [0.0; 8];
        assert_eq!(n.classify().1, NodeState::Inside);
    }

    #[test]
    fn test_child_center_offset() {
        let n = leaf([-1.0; 8]);
        assert_eq!(n.child_center(4), Point3::new(0.5, 0.5, 0.5));
        assert_eq!(n.child_center(2), Point3::new(-0.5, -0.5, -0.5));
    }

    #[test]
    fn test_multi_axis_aabb_enlarged() {
        let n = Node::new(
            Point3::origin(),
            1.0,
            0,
            0,
            None,
            NodeState::Undecided,
            NodeState::Outside,
            [-1.0; 8],
            Material::Stock,
            true,
        );
        assert_eq!(n.aabb.min(), Point3::new(-2.0, -2.0, -2.0));
    }
}
