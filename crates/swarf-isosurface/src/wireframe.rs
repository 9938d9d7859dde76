//! Cube-wireframe debug extractor: draws the 12 edges of each leaf cell,
//! coloured by cell state.

use swarf_mesh::{CellKey, FillMode, GeometryBuffer, MeshVertex, PolygonKind};
use swarf_octree::{NodeState, Octree};

use crate::tables::EDGE_VERTICES;
use crate::IsoSurface;

/// Wireframe rendering of the octree structure itself.
#[derive(Debug, Clone)]
pub struct CubeWireframe {
    /// Colour for Inside leaves.
    pub inside_color: [f32; 3],
    /// Colour for Undecided leaves.
    pub undecided_color: [f32; 3],
    /// Colour for Outside leaves.
    pub outside_color: [f32; 3],
    /// Draw Inside leaves.
    pub draw_inside: bool,
    /// Draw Undecided leaves.
    pub draw_undecided: bool,
    /// Draw Outside leaves.
    pub draw_outside: bool,
}

impl Default for CubeWireframe {
    fn default() -> Self {
        Self {
            inside_color: [0.0, 0.0, 1.0],
            undecided_color: [0.0, 1.0, 0.0],
            outside_color: [0.3, 0.0, 0.0],
            draw_inside: true,
            draw_undecided: true,
            draw_outside: false,
        }
    }
}

impl CubeWireframe {
    /// Create the extractor with its default colours.
    pub fn new() -> Self {
        Self::default()
    }

    fn update_node(&self, tree: &mut Octree, buf: &mut GeometryBuffer, key: CellKey) {
        if tree.node(key).is_valid() {
            return;
        }
        tree.clear_cell_vertices(key, buf);
        match tree.node(key).children {
            Some(children) => {
                for c in children {
                    self.update_node(tree, buf, c);
                }
                if !tree.node(key).is_valid()
                    && children.iter().all(|&c| tree.node(c).is_valid())
                {
                    tree.set_valid(key);
                }
            }
            None => {
                let node = tree.node(key);
                let (draw, color) = match node.state {
                    NodeState::Inside => (self.draw_inside, self.inside_color),
                    NodeState::Undecided => (self.draw_undecided, self.undecided_color),
                    NodeState::Outside => (self.draw_outside, self.outside_color),
                };
                if draw {
                    let corners = node.corners();
                    for [a, b] in EDGE_VERTICES {
                        let mut ids = [0u32; 2];
                        for (slot, p) in ids.iter_mut().zip([corners[a], corners[b]]) {
                            let v = MeshVertex::new(
                                [p.x as f32, p.y as f32, p.z as f32],
                                color,
                            );
                            let id = buf.add_vertex(v, key);
                            tree.record_vertex(key, id);
                            *slot = id;
                        }
                        buf.add_polygon(&ids);
                    }
                }
                tree.set_valid(key);
            }
        }
    }
}

impl IsoSurface for CubeWireframe {
    fn update_mesh(&self, tree: &mut Octree, buf: &mut GeometryBuffer) {
        buf.set_polygon_kind(PolygonKind::Lines);
        buf.set_fill_mode(FillMode::Line);
        let root = tree.root();
        self.update_node(tree, buf, root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarf_math::Point3;
    use swarf_volume::{Material, Sphere, Volume};

    #[test]
    fn test_wireframe_draws_surface_cells() {
        let mut tree = Octree::new(Point3::origin(), 1.0, 5, false).unwrap();
        tree.init(2);
        let mut buf = GeometryBuffer::new();
        let ball = Volume::from(Sphere::new(Point3::origin(), 0.5, Material::Stock));
        tree.union_with(&ball, &mut buf).unwrap();
        CubeWireframe::new().update_mesh(&mut tree, &mut buf);
        // 12 line segments per drawn leaf
        assert!(buf.polygon_count() > 0);
        assert_eq!(buf.polygon_count() % 12, 0);
        assert!(tree.node(tree.root()).is_valid());
    }

    #[test]
    fn test_wireframe_skips_outside_cells_by_default() {
        let mut tree = Octree::new(Point3::origin(), 1.0, 5, false).unwrap();
        tree.init(2);
        let mut buf = GeometryBuffer::new();
        CubeWireframe::new().update_mesh(&mut tree, &mut buf);
        assert_eq!(buf.polygon_count(), 0);
    }
}
