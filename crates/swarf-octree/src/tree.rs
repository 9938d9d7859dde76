//! The octree and its CSG operations.

use slotmap::SlotMap;
use swarf_math::Point3;
use swarf_mesh::{CellKey, GeometryBuffer};
use swarf_volume::{CollisionFlags, Cutter, Material, Volume};

use crate::node::{Node, NodeState};
use crate::{Result, TreeError};

/// Accumulated result of one collision-reporting subtract.
#[derive(Debug, Clone, Copy, Default)]
pub struct CuttingStatus {
    /// Corners whose subtract removed material.
    pub cut_count: u32,
    /// Union of the guarded regions hit.
    pub collision: CollisionFlags,
}

impl CuttingStatus {
    fn merge(&mut self, other: CuttingStatus) {
        self.cut_count += other.cut_count;
        self.collision |= other.collision;
    }
}

/// Which pruning rule an operation uses once all eight children agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PruneRule {
    /// Collapse on uniform Inside or uniform Outside.
    Both,
    /// Collapse only on uniform Outside.
    OutsideOnly,
}

/// Per-depth census of the tree, for the debug surface.
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    /// Node count per depth.
    pub nodes_at_depth: Vec<usize>,
    /// Nodes with stale mesh output per depth.
    pub invalid_at_depth: Vec<usize>,
    /// Undecided (surface) nodes per depth.
    pub undecided_at_depth: Vec<usize>,
}

impl TreeStats {
    /// Total number of live nodes.
    pub fn total(&self) -> usize {
        self.nodes_at_depth.iter().sum()
    }
}

/// The adaptive signed-distance octree holding the workpiece.
pub struct Octree {
    nodes: SlotMap<CellKey, Node>,
    root: CellKey,
    root_scale: f64,
    max_depth: u8,
    multi_axis: bool,
}

impl Octree {
    /// Create a tree with the root cube at `center`, extending
    /// `root_scale` from the centre to each face. `max_depth` bounds
    /// subdivision; `multi_axis` enlarges cell bounds so rotated cutters
    /// are never missed by the overlap test.
    pub fn new(center: Point3, root_scale: f64, max_depth: u8, multi_axis: bool) -> Result<Self> {
        if max_depth < 3 {
            return Err(TreeError::DepthTooSmall(max_depth));
        }
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(
            center,
            root_scale,
            0,
            0,
            None,
            NodeState::Undecided,
            NodeState::Outside,
            [-1.0; 8],
            Material::Stock,
            multi_axis,
        ));
        Ok(Self {
            nodes,
            root,
            root_scale,
            max_depth,
            multi_axis,
        })
    }

    /// Uniformly subdivide every leaf `levels` times.
    pub fn init(&mut self, levels: u32) {
        for _ in 0..levels {
            let leaves = self.collect_leaves(self.root);
            for leaf in leaves {
                self.force_undecided(leaf);
                self.subdivide(leaf);
            }
        }
    }

    /// The root cell key.
    pub fn root(&self) -> CellKey {
        self.root
    }

    /// Borrow a cell. Panics on a dead key.
    pub fn node(&self, key: CellKey) -> &Node {
        &self.nodes[key]
    }

    /// Borrow a cell if it is still alive.
    pub fn get(&self, key: CellKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Number of live cells.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Maximum subdivision depth.
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Half-scale of the root cube.
    pub fn root_scale(&self) -> f64 {
        self.root_scale
    }

    /// Side length of a cell at the deepest subdivision level.
    pub fn leaf_scale(&self) -> f64 {
        (2.0 * self.root_scale) / f64::powi(2.0, i32::from(self.max_depth))
    }

    /// Side length of the deepest cells actually produced by CSG
    /// (subdivision stops at `max_depth − 1`); the resolution used by the
    /// spindle-power estimate.
    pub fn cube_resolution(&self) -> f64 {
        (2.0 * self.root_scale) / f64::powi(2.0, i32::from(self.max_depth) - 1)
    }

    /// Union the tree with a volume: `f ← max(f, d)`.
    pub fn union_with(&mut self, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        self.sum_rec(self.root, vol, buf)
    }

    /// Subtract a volume from the tree: `f ← min(f, −d)`.
    pub fn subtract(&mut self, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        self.diff_rec(self.root, vol, buf)
    }

    /// Intersect the tree with a volume: `f ← min(f, d)`.
    pub fn intersect(&mut self, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        self.int_rec(self.root, vol, buf)
    }

    /// Subtract a positioned cutter, reporting removed material and
    /// guarded-region collisions from the deepest cells.
    pub fn subtract_cutter(
        &mut self,
        cutter: &Cutter,
        buf: &mut GeometryBuffer,
    ) -> Result<CuttingStatus> {
        self.diff_cutter_rec(self.root, cutter, buf)
    }

    // ---- traversals ----------------------------------------------------

    fn sum_rec(&mut self, key: CellKey, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        {
            let node = &self.nodes[key];
            if node.state == NodeState::Inside || !vol.aabb().overlaps(&node.aabb) {
                return Ok(());
            }
        }
        let crossed = self.apply_union(key, vol);
        self.update_state(key);
        if let Some(children) = self.nodes[key].children {
            for c in children {
                self.sum_rec(c, vol, buf)?;
            }
        } else if crossed && self.can_subdivide(key) {
            self.force_undecided(key);
            for c in self.subdivide(key) {
                self.sum_rec(c, vol, buf)?;
            }
        }
        self.prune(key, PruneRule::Both, buf)
    }

    fn diff_rec(&mut self, key: CellKey, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        {
            let node = &self.nodes[key];
            if node.state == NodeState::Outside || !vol.aabb().overlaps(&node.aabb) {
                return Ok(());
            }
        }
        let crossed = self.apply_subtract(key, vol);
        self.update_state(key);
        if let Some(children) = self.nodes[key].children {
            for c in children {
                self.diff_rec(c, vol, buf)?;
            }
        } else if crossed && self.can_subdivide(key) {
            self.force_undecided(key);
            for c in self.subdivide(key) {
                self.diff_rec(c, vol, buf)?;
            }
        }
        self.prune(key, PruneRule::OutsideOnly, buf)
    }

    fn int_rec(&mut self, key: CellKey, vol: &Volume, buf: &mut GeometryBuffer) -> Result<()> {
        // no bounding-box early exit: intersection must also visit cells
        // the volume does not cover, because they become outside
        if self.nodes[key].state == NodeState::Outside {
            return Ok(());
        }
        let crossed = self.apply_intersect(key, vol);
        self.update_state(key);
        if let Some(children) = self.nodes[key].children {
            for c in children {
                self.int_rec(c, vol, buf)?;
            }
        } else if crossed && self.can_subdivide(key) {
            self.force_undecided(key);
            for c in self.subdivide(key) {
                self.int_rec(c, vol, buf)?;
            }
        }
        self.prune(key, PruneRule::Both, buf)
    }

    fn diff_cutter_rec(
        &mut self,
        key: CellKey,
        cutter: &Cutter,
        buf: &mut GeometryBuffer,
    ) -> Result<CuttingStatus> {
        let mut status = CuttingStatus::default();
        {
            let node = &self.nodes[key];
            if node.state == NodeState::Outside {
                return Ok(status);
            }
            let hits_body = cutter.aabb().overlaps(&node.aabb);
            let hits_holder =
                cutter.holder_enabled && cutter.holder_aabb().overlaps(&node.aabb);
            if !hits_body && !hits_holder {
                return Ok(status);
            }
        }
        let crossed = if self.nodes[key].depth == self.max_depth - 1 {
            let (crossed, leaf_status) = self.apply_subtract_classify(key, cutter);
            status.merge(leaf_status);
            crossed
        } else {
            self.apply_subtract_dist(key, cutter)
        };
        self.update_state(key);
        if let Some(children) = self.nodes[key].children {
            for c in children {
                status.merge(self.diff_cutter_rec(c, cutter, buf)?);
            }
        } else if crossed && self.can_subdivide(key) {
            self.force_undecided(key);
            for c in self.subdivide(key) {
                status.merge(self.diff_cutter_rec(c, cutter, buf)?);
            }
        }
        self.prune(key, PruneRule::OutsideOnly, buf)?;
        Ok(status)
    }

    // ---- per-cell corner rules -----------------------------------------

    /// `f ← max(f, d)`. Returns true if any corner sample changed sign.
    fn apply_union(&mut self, key: CellKey, vol: &Volume) -> bool {
        let corners = self.nodes[key].corners();
        let node = &mut self.nodes[key];
        let mut crossed = false;
        for n in 0..8 {
            let d = vol.dist(corners[n]);
            if d > node.f[n] {
                crossed |= (d >= 0.0) != (node.f[n] >= 0.0);
                node.f[n] = d;
                node.material = vol.material();
            }
        }
        crossed
    }

    /// `f ← min(f, −d)`. Returns true if any corner sample changed sign.
    fn apply_subtract(&mut self, key: CellKey, vol: &Volume) -> bool {
        let corners = self.nodes[key].corners();
        let node = &mut self.nodes[key];
        let mut crossed = false;
        for n in 0..8 {
            let d = -vol.dist(corners[n]);
            if d < node.f[n] {
                crossed |= (d >= 0.0) != (node.f[n] >= 0.0);
                node.f[n] = d;
                node.material = vol.material();
            }
        }
        crossed
    }

    /// `f ← min(f, d)`. Returns true if any corner sample changed sign.
    fn apply_intersect(&mut self, key: CellKey, vol: &Volume) -> bool {
        let corners = self.nodes[key].corners();
        let node = &mut self.nodes[key];
        let mut crossed = false;
        for n in 0..8 {
            let d = vol.dist(corners[n]);
            if d < node.f[n] {
                crossed |= (d >= 0.0) != (node.f[n] >= 0.0);
                node.f[n] = d;
                node.material = vol.material();
            }
        }
        crossed
    }

    /// Subtract with the cutter's plain distance (shallow cells).
    fn apply_subtract_dist(&mut self, key: CellKey, cutter: &Cutter) -> bool {
        let corners = self.nodes[key].corners();
        let node = &mut self.nodes[key];
        let mut crossed = false;
        for n in 0..8 {
            let d = -cutter.dist(corners[n]);
            if d < node.f[n] {
                crossed |= (d >= 0.0) != (node.f[n] >= 0.0);
                node.f[n] = d;
                node.material = cutter.material;
            }
        }
        crossed
    }

    /// Subtract with per-corner classification at the deepest cells:
    /// counts removed corners, collects guarded-region hits, and flags
    /// cuts into protected part material.
    fn apply_subtract_classify(&mut self, key: CellKey, cutter: &Cutter) -> (bool, CuttingStatus) {
        let corners = self.nodes[key].corners();
        let node = &mut self.nodes[key];
        let mut crossed = false;
        let mut status = CuttingStatus::default();
        for n in 0..8 {
            let r = cutter.classify(corners[n]);
            if -r.f < node.f[n] {
                crossed |= (-r.f >= 0.0) != (node.f[n] >= 0.0);
                node.f[n] = -r.f;
                status.collision |= r.collision;
                if node.material == Material::Parts {
                    status.collision |= CollisionFlags::PARTS;
                }
                status.cut_count += 1;
                node.material = cutter.material;
            }
        }
        if !status.collision.is_empty() {
            node.material = Material::Collision;
        }
        (crossed, status)
    }

    // ---- state & validity ----------------------------------------------

    /// Re-derive `state` from the corner signs, promote uniform states
    /// towards the root, and invalidate the mesh on any transition.
    fn update_state(&mut self, key: CellKey) {
        let (old, derived) = self.nodes[key].classify();
        match derived {
            NodeState::Inside => self.promote(key, NodeState::Inside),
            NodeState::Outside => self.promote(key, NodeState::Outside),
            NodeState::Undecided => {
                let node = &mut self.nodes[key];
                if node.state != NodeState::Undecided {
                    node.prev_state = node.state;
                    node.state = NodeState::Undecided;
                }
            }
        }
        let new = self.nodes[key].state;
        let unchanged = (old == NodeState::Inside && new == NodeState::Inside)
            || (old == NodeState::Outside && new == NodeState::Outside);
        if !unchanged {
            self.set_invalid(key);
        }
    }

    /// Adopt `target` if all children (if any) agree, then try the parent.
    fn promote(&mut self, key: CellKey, target: NodeState) {
        if self.nodes[key].state == target || !self.all_children_in(key, target) {
            return;
        }
        self.nodes[key].state = target;
        if let Some(parent) = self.nodes[key].parent {
            if self.nodes[parent].state != target {
                self.promote(parent, target);
            }
        }
    }

    fn all_children_in(&self, key: CellKey, state: NodeState) -> bool {
        match self.nodes[key].children {
            Some(children) => children.iter().all(|&c| self.nodes[c].state == state),
            None => true,
        }
    }

    /// Clear `mesh_valid` here and on every ancestor until one was
    /// already invalid; the parent's child mask loses this cell's bit.
    fn set_invalid(&mut self, key: CellKey) {
        let mut current = key;
        loop {
            self.nodes[current].mesh_valid = false;
            let (parent, idx) = match self.nodes[current].parent {
                Some(p) => (p, self.nodes[current].idx),
                None => break,
            };
            let parent_node = &mut self.nodes[parent];
            parent_node.child_valid_mask &= !(1u8 << idx);
            if !parent_node.mesh_valid {
                break;
            }
            current = parent;
        }
    }

    /// Mark a cell's mesh output up to date. Called by the extractor once
    /// the cell has been re-meshed; a parent whose eight children are all
    /// valid becomes valid itself.
    pub fn set_valid(&mut self, key: CellKey) {
        let mut current = key;
        loop {
            self.nodes[current].mesh_valid = true;
            let (parent, idx) = match self.nodes[current].parent {
                Some(p) => (p, self.nodes[current].idx),
                None => break,
            };
            let parent_node = &mut self.nodes[parent];
            parent_node.child_valid_mask |= 1u8 << idx;
            if parent_node.child_valid_mask == 0xFF && !parent_node.mesh_valid {
                current = parent;
            } else {
                break;
            }
        }
    }

    /// Register a mesh vertex produced for this cell.
    pub fn record_vertex(&mut self, key: CellKey, id: u32) {
        let inserted = self.nodes[key].vertex_ids.insert(id);
        debug_assert!(inserted, "vertex id registered twice");
    }

    /// Remove every mesh vertex this cell contributed, highest id first,
    /// applying the buffer's swap-remove move notifications to whichever
    /// cell owns the moved vertex.
    pub fn clear_cell_vertices(&mut self, key: CellKey, buf: &mut GeometryBuffer) {
        while let Some(&id) = self.nodes[key].vertex_ids.iter().next_back() {
            self.nodes[key].vertex_ids.remove(&id);
            if let Some(moved) = buf.remove_vertex(id) {
                match self.nodes.get_mut(moved.owner) {
                    Some(owner) => {
                        let had = owner.vertex_ids.remove(&moved.from);
                        debug_assert!(had, "moved vertex unknown to its owner");
                        owner.vertex_ids.insert(moved.to);
                    }
                    None => {
                        // generation check failed: the owner died without
                        // releasing its vertices first
                        log::error!("mesh vertex {} owned by a dead cell", moved.from);
                    }
                }
            }
        }
    }

    // ---- subdivision & pruning -----------------------------------------

    fn can_subdivide(&self, key: CellKey) -> bool {
        self.nodes[key].depth < self.max_depth - 1
    }

    /// Record the current state as `prev_state` and become Undecided, so
    /// subdivision can seed children.
    fn force_undecided(&mut self, key: CellKey) {
        let node = &mut self.nodes[key];
        if node.state != NodeState::Undecided {
            node.prev_state = node.state;
            node.state = NodeState::Undecided;
        }
    }

    /// Create all eight children and return them. The cell must be
    /// Undecided and its `prev_state` decides the children's seed
    /// samples: `+1` after Inside, `−1` after Outside.
    fn subdivide(&mut self, key: CellKey) -> [CellKey; 8] {
        debug_assert!(self.nodes[key].is_leaf(), "subdivide of a non-leaf");
        debug_assert_eq!(self.nodes[key].state, NodeState::Undecided);
        let (prev, material, depth, scale) = {
            let node = &self.nodes[key];
            (node.prev_state, node.material, node.depth, node.scale)
        };
        debug_assert_ne!(prev, NodeState::Undecided);
        let seed = if prev == NodeState::Inside { 1.0 } else { -1.0 };
        let mut children = [CellKey::default(); 8];
        for (n, child) in children.iter_mut().enumerate() {
            let center = self.nodes[key].child_center(n);
            *child = self.nodes.insert(Node::new(
                center,
                scale * 0.5,
                depth + 1,
                n as u8,
                Some(key),
                prev,
                prev,
                [seed; 8],
                material,
                self.multi_axis,
            ));
        }
        let node = &mut self.nodes[key];
        node.children = Some(children);
        node.child_valid_mask = 0;
        children
    }

    /// Collapse this cell if all eight children share a state the rule
    /// permits, adopting that state and releasing the children.
    fn prune(&mut self, key: CellKey, rule: PruneRule, buf: &mut GeometryBuffer) -> Result<()> {
        let Some(children) = self.nodes[key].children else {
            return Ok(());
        };
        let s0 = self.nodes[children[0]].state;
        if s0 == NodeState::Undecided {
            return Ok(());
        }
        if !children.iter().all(|&c| self.nodes[c].state == s0) {
            return Ok(());
        }
        if rule == PruneRule::OutsideOnly && s0 != NodeState::Outside {
            return Ok(());
        }
        self.nodes[key].state = s0;
        self.delete_children(key, buf)
    }

    /// Release all children. Precondition: the children exist and agree on
    /// a decided state; disagreement aborts the operation.
    fn delete_children(&mut self, key: CellKey, buf: &mut GeometryBuffer) -> Result<()> {
        let Some(children) = self.nodes[key].children else {
            return Ok(());
        };
        let s0 = self.nodes[children[0]].state;
        for &c in &children {
            if self.nodes[c].state != s0 {
                return Err(TreeError::PruneStateMismatch {
                    depth: self.nodes[key].depth,
                });
            }
        }
        for &c in &children {
            self.remove_subtree(c, buf);
        }
        let node = &mut self.nodes[key];
        node.children = None;
        node.child_valid_mask = 0;
        Ok(())
    }

    /// Remove a subtree, releasing mesh vertices before the cells that
    /// own them.
    fn remove_subtree(&mut self, key: CellKey, buf: &mut GeometryBuffer) {
        if let Some(children) = self.nodes[key].children {
            for c in children {
                self.remove_subtree(c, buf);
            }
        }
        self.clear_cell_vertices(key, buf);
        self.nodes.remove(key);
    }

    // ---- inspection ----------------------------------------------------

    fn collect_leaves(&self, key: CellKey) -> Vec<CellKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            match self.nodes[k].children {
                Some(children) => stack.extend(children),
                None => out.push(k),
            }
        }
        out
    }

    /// Leaf cells, for tests and the wireframe extractor.
    pub fn leaves(&self) -> Vec<CellKey> {
        self.collect_leaves(self.root)
    }

    /// Per-depth census of nodes, invalid nodes and surface nodes.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let depths = usize::from(self.max_depth);
        stats.nodes_at_depth.resize(depths, 0);
        stats.invalid_at_depth.resize(depths, 0);
        stats.undecided_at_depth.resize(depths, 0);
        let mut stack = vec![self.root];
        while let Some(k) = stack.pop() {
            let node = &self.nodes[k];
            let d = usize::from(node.depth);
            stats.nodes_at_depth[d] += 1;
            if !node.mesh_valid {
                stats.invalid_at_depth[d] += 1;
            }
            if node.state == NodeState::Undecided {
                stats.undecided_at_depth[d] += 1;
            }
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarf_volume::{Rect, Sphere};

    fn stock_cube(material: Material) -> Volume {
        Rect::from_corner(Point3::new(-0.5, -0.5, -0.5), 1.0, 1.0, 1.0)
            .with_material(material)
            .into()
    }

    fn new_tree(depth: u8) -> (Octree, GeometryBuffer) {
        let mut tree = Octree::new(Point3::origin(), 0.75, depth, false).unwrap();
        tree.init(2);
        (tree, GeometryBuffer::new())
    }

    /// state/f agreement on every leaf (invariant I1).
    fn check_leaf_states(tree: &Octree) {
        for k in tree.leaves() {
            let node = tree.node(k);
            let inside = node.f.iter().all(|&v| v >= 0.0);
            let outside = node.f.iter().all(|&v| v < 0.0);
            match node.state {
                NodeState::Inside => assert!(inside, "Inside leaf with negative corner"),
                NodeState::Outside => assert!(outside, "Outside leaf with positive corner"),
                NodeState::Undecided => {
                    assert!(!inside && !outside, "Undecided leaf with uniform corners")
                }
            }
        }
    }

    /// no parent retains eight same-state children (invariant I2).
    fn check_pruned(tree: &Octree) {
        let mut stack = vec![tree.root()];
        while let Some(k) = stack.pop() {
            if let Some(children) = tree.node(k).children {
                let s0 = tree.node(children[0]).state;
                let uniform = s0 != NodeState::Undecided
                    && children.iter().all(|&c| tree.node(c).state == s0);
                assert!(!uniform, "unpruned uniform children at depth {}", tree.node(k).depth);
                stack.extend(children);
            }
        }
    }

    #[test]
    fn test_depth_too_small() {
        assert!(Octree::new(Point3::origin(), 1.0, 2, false).is_err());
    }

    #[test]
    fn test_new_tree_is_outside() {
        let (tree, _) = new_tree(5);
        // init subdivides twice: 1 + 8 + 64 nodes
        assert_eq!(tree.node_count(), 73);
        for k in tree.leaves() {
            assert_eq!(tree.node(k).state, NodeState::Outside);
        }
    }

    #[test]
    fn test_resolution() {
        let tree = Octree::new(Point3::origin(), 0.5, 6, false).unwrap();
        // root side is 1.0; the deepest CSG cells live at depth 5
        assert!((tree.cube_resolution() - 1.0 / 32.0).abs() < 1e-12);
        assert!((tree.leaf_scale() - 1.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn test_union_builds_stock() {
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        check_leaf_states(&tree);
        check_pruned(&tree);
        // the tree centre is solid stock now
        let root = tree.node(tree.root());
        assert_ne!(root.state, NodeState::Outside);
        // a corner sample well inside the cube must be positive on the
        // leaf containing it
        let leaf = tree
            .leaves()
            .into_iter()
            .find(|&k| tree.node(k).aabb.contains_point(Point3::origin()))
            .unwrap();
        assert_ne!(tree.node(leaf).state, NodeState::Outside);
    }

    #[test]
    fn test_union_with_empty_volume_is_noop() {
        // L1: a volume whose bounding box misses the tree changes nothing
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        let before = tree.node_count();
        let far = Volume::from(Sphere::new(Point3::new(50.0, 0.0, 0.0), 0.1, Material::Stock));
        tree.union_with(&far, &mut buf).unwrap();
        assert_eq!(tree.node_count(), before);
    }

    #[test]
    fn test_subtract_self_empties_tree() {
        // L2: stock minus itself is all Outside
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        tree.subtract(&stock_cube(Material::Stock), &mut buf).unwrap();
        let root = tree.node(tree.root());
        assert_eq!(root.state, NodeState::Outside);
        check_leaf_states(&tree);
    }

    #[test]
    fn test_subtract_enclosing_sphere_prunes_to_root() {
        // spec §8 scenario 3
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        let everything = Volume::from(Sphere::new(Point3::origin(), 10.0, Material::Stock));
        tree.subtract(&everything, &mut buf).unwrap();
        let root = tree.node(tree.root());
        assert_eq!(root.state, NodeState::Outside);
        assert!(root.is_leaf());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_intersect_keeps_overlap() {
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        // intersect with a sphere centred on a cube corner
        let ball = Volume::from(Sphere::new(Point3::new(0.5, 0.5, 0.5), 0.25, Material::Stock));
        tree.intersect(&ball, &mut buf).unwrap();
        check_leaf_states(&tree);
        check_pruned(&tree);
        // centre of the cube is gone
        let leaf = tree
            .leaves()
            .into_iter()
            .find(|&k| tree.node(k).aabb.contains_point(Point3::origin()))
            .unwrap();
        assert_eq!(tree.node(leaf).state, NodeState::Outside);
    }

    #[test]
    fn test_disjoint_ops_commute() {
        // L3: disjoint volumes produce the same tree in either order
        let a = Volume::from(Sphere::new(Point3::new(-0.4, 0.0, 0.0), 0.2, Material::Stock));
        let b = Volume::from(Sphere::new(Point3::new(0.4, 0.0, 0.0), 0.2, Material::Stock));

        let (mut t1, mut buf1) = new_tree(5);
        t1.union_with(&a, &mut buf1).unwrap();
        t1.union_with(&b, &mut buf1).unwrap();
        let (mut t2, mut buf2) = new_tree(5);
        t2.union_with(&b, &mut buf2).unwrap();
        t2.union_with(&a, &mut buf2).unwrap();

        let snapshot = |t: &Octree| {
            let mut leaves: Vec<(String, NodeState)> = t
                .leaves()
                .into_iter()
                .map(|k| {
                    let n = t.node(k);
                    let c = n.center;
                    (format!("{:.6} {:.6} {:.6}", c.x, c.y, c.z), n.state)
                })
                .collect();
            leaves.sort_by(|a, b| a.0.cmp(&b.0));
            leaves
        };
        assert_eq!(snapshot(&t1), snapshot(&t2));
    }

    #[test]
    fn test_union_round_trip_classification() {
        // L4: corners the volume classifies as inside end up in
        // non-Outside leaves
        let (mut tree, mut buf) = new_tree(6);
        let ball = Volume::from(Sphere::new(Point3::origin(), 0.3, Material::Stock));
        tree.union_with(&ball, &mut buf).unwrap();
        for k in tree.leaves() {
            let node = tree.node(k);
            for n in 0..8 {
                if ball.dist(node.corner(n)) > 1e-9 {
                    assert!(
                        node.f[n] >= 0.0,
                        "corner inside the volume sampled negative"
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalidation_reaches_root() {
        // I4: after a mutation, the path from root to a changed cell is
        // invalid
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        // mark everything valid, as if an extraction had completed
        for k in tree.leaves() {
            tree.set_valid(k);
        }
        assert!(tree.node(tree.root()).is_valid());
        let bite = Volume::from(Sphere::new(
            Point3::new(0.5, 0.5, 0.5),
            0.1,
            Material::Stock,
        ));
        tree.subtract(&bite, &mut buf).unwrap();
        assert!(!tree.node(tree.root()).is_valid());
        // some leaf near the bite is invalid
        let any_invalid = tree.leaves().into_iter().any(|k| !tree.node(k).is_valid());
        assert!(any_invalid);
    }

    #[test]
    fn test_cutter_subtract_reports_cuts() {
        // spec §8 scenario 1: plunge a cylinder cutter into the stock top
        let (mut tree, mut buf) = new_tree(6);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        let mut cutter = Cutter::cylinder(2.0, 0.2);
        cutter.set_center(Point3::new(0.0, 0.0, 0.0));
        let status = tree.subtract_cutter(&cutter, &mut buf).unwrap();
        assert!(status.cut_count > 0);
        assert!(status.collision.is_empty());
        check_leaf_states(&tree);
        check_pruned(&tree);
        // material above the stock on the axis is removed: the leaf at the
        // centre is no longer Inside
        let leaf = tree
            .leaves()
            .into_iter()
            .find(|&k| tree.node(k).aabb.contains_point(Point3::new(0.0, 0.0, 0.3)))
            .unwrap();
        assert_ne!(tree.node(leaf).state, NodeState::Inside);
        // stock away from the hole survives
        let survivor = tree
            .leaves()
            .into_iter()
            .find(|&k| {
                tree.node(k)
                    .aabb
                    .contains_point(Point3::new(0.35, 0.35, -0.25))
            })
            .unwrap();
        assert_ne!(tree.node(survivor).state, NodeState::Outside);
    }

    #[test]
    fn test_cutter_holder_and_parts_collision() {
        // spec §8 scenario 2: the holder dips into parts material
        let (mut tree, mut buf) = new_tree(6);
        tree.union_with(&stock_cube(Material::Parts), &mut buf).unwrap();
        let mut cutter = Cutter::cylinder(0.2, 0.1);
        cutter.set_holder(0.3, 0.5);
        // tool tip below the stock so the holder band [0.2, 0.7) covers
        // the upper half of the cube
        cutter.set_center(Point3::new(0.0, 0.0, -0.2));
        let status = tree.subtract_cutter(&cutter, &mut buf).unwrap();
        assert!(status.collision.intersects(CollisionFlags::HOLDER));
        assert!(status.collision.intersects(CollisionFlags::PARTS));
        assert!(status.cut_count > 0);
    }

    #[test]
    fn test_cutter_outside_stock_is_noop() {
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        let before = tree.node_count();
        let mut cutter = Cutter::cylinder(1.0, 0.1);
        cutter.set_center(Point3::new(5.0, 5.0, 5.0));
        let status = tree.subtract_cutter(&cutter, &mut buf).unwrap();
        assert_eq!(status.cut_count, 0);
        assert!(status.collision.is_empty());
        assert_eq!(tree.node_count(), before);
    }

    #[test]
    fn test_stats_census() {
        let (mut tree, mut buf) = new_tree(5);
        tree.union_with(&stock_cube(Material::Stock), &mut buf).unwrap();
        let stats = tree.stats();
        assert_eq!(stats.total(), tree.node_count());
        assert!(stats.undecided_at_depth.iter().sum::<usize>() > 0);
    }
}
