//! Marching-cubes extraction from the octree distance field.

use swarf_math::Point3;
use swarf_mesh::{CellKey, FillMode, GeometryBuffer, MeshVertex, PolygonKind};
use swarf_octree::{NodeState, Octree};

use crate::tables::{EDGE_TABLE, EDGE_VERTICES, TRI_TABLE};
use crate::IsoSurface;

/// Triangles whose area falls below this are dropped rather than emitted.
const DEGENERATE_AREA: f64 = 1e-12;

/// Classic marching cubes: an 8-bit corner sign mask selects crossed
/// edges and up to five triangles per cell; edge vertices are linear
/// interpolations of the corner samples.
#[derive(Debug, Default)]
pub struct MarchingCubes;

impl MarchingCubes {
    /// Create the extractor.
    pub fn new() -> Self {
        Self
    }

    fn update_node(&self, tree: &mut Octree, buf: &mut GeometryBuffer, key: CellKey) {
        if tree.node(key).is_valid() {
            return;
        }
        // stale output from before a subdivision or prune
        tree.clear_cell_vertices(key, buf);
        match tree.node(key).children {
            Some(children) => {
                for c in children {
                    self.update_node(tree, buf, c);
                }
                // validity normally propagates up through the child mask;
                // cover the case where every child was already valid
                if !tree.node(key).is_valid()
                    && children.iter().all(|&c| tree.node(c).is_valid())
                {
                    tree.set_valid(key);
                }
            }
            None => {
                if tree.node(key).state == NodeState::Undecided {
                    self.mesh_cell(tree, buf, key);
                }
                tree.set_valid(key);
            }
        }
    }

    /// Generate the triangles for one surface cell.
    fn mesh_cell(&self, tree: &mut Octree, buf: &mut GeometryBuffer, key: CellKey) {
        let node = tree.node(key);
        let corners = node.corners();
        let f = node.f;
        let color = node.material.color();

        let mut mask = 0usize;
        for (n, &fv) in f.iter().enumerate() {
            if fv >= 0.0 {
                mask |= 1 << n;
            }
        }
        let edges = EDGE_TABLE[mask];
        if edges == 0 {
            return;
        }

        // interpolated vertex on each crossed edge
        let mut edge_points = [Point3::origin(); 12];
        for (e, &[a, b]) in EDGE_VERTICES.iter().enumerate() {
            if edges & (1 << e) != 0 {
                let t = f[a] / (f[a] - f[b]);
                edge_points[e] = corners[a] + (corners[b] - corners[a]) * t;
            }
        }

        let tri_row = &TRI_TABLE[mask];
        for tri in tri_row.chunks(3).take_while(|t| t[0] >= 0) {
            let p0 = edge_points[tri[0] as usize];
            let p1 = edge_points[tri[1] as usize];
            let p2 = edge_points[tri[2] as usize];
            let n = (p0 - p1).cross(&(p0 - p2));
            let area2 = n.norm();
            if area2 <= DEGENERATE_AREA {
                continue;
            }
            let n = n / area2;
            let normal = [n.x as f32, n.y as f32, n.z as f32];
            let mut ids = [0u32; 3];
            for (slot, p) in ids.iter_mut().zip([p0, p1, p2]) {
                let mut v = MeshVertex::new([p.x as f32, p.y as f32, p.z as f32], color);
                v.normal = normal;
                let id = buf.add_vertex(v, key);
                tree.record_vertex(key, id);
                *slot = id;
            }
            buf.add_polygon(&ids);
        }
    }
}

impl IsoSurface for MarchingCubes {
    fn update_mesh(&self, tree: &mut Octree, buf: &mut GeometryBuffer) {
        buf.set_polygon_kind(PolygonKind::Triangles);
        buf.set_fill_mode(FillMode::Fill);
        let root = tree.root();
        self.update_node(tree, buf, root);
        log::trace!(
            "marching cubes: {} vertices, {} triangles",
            buf.vertex_count(),
            buf.polygon_count()
        );
    }
}
