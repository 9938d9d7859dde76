#![warn(missing_docs)]

//! Double-buffered render geometry for the swarf cutting simulation.
//!
//! A [`GeometryBuffer`] holds two complete `(vertices, indices)` snapshots:
//! the *render* side, shared with the renderer behind a mutex it holds for
//! the duration of one frame, and the *work* side, mutated exclusively by
//! the iso-surface extractor. [`GeometryBuffer::swap`] exchanges the two
//! under both locks and then resynchronises the new work side.
//!
//! Every vertex records the octree cell that produced it. Vertex removal
//! swap-removes from the arrays, which moves the last vertex into the
//! vacated slot; the move is reported back to the moved vertex's owning
//! cell so its stored ids stay correct. Polygon removal is the symmetric
//! swap-remove with index renumbering.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked handle of the octree cell that owns a vertex.
    ///
    /// The octree allocates these from its node pool; a stale key after
    /// cell death fails the slotmap generation check on the octree side.
    pub struct CellKey;
}

/// How the index array is grouped into polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonKind {
    /// Three indices per polygon.
    Triangles,
    /// Two indices per polygon (wireframe).
    Lines,
    /// Four indices per polygon.
    Quads,
}

impl PolygonKind {
    /// Vertices per polygon.
    pub fn verts_per_polygon(&self) -> usize {
        match self {
            PolygonKind::Triangles => 3,
            PolygonKind::Lines => 2,
            PolygonKind::Quads => 4,
        }
    }
}

/// How polygons should be rasterised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Filled polygons.
    Fill,
    /// Outlines only.
    Line,
    /// Vertices only.
    Point,
}

/// Rendering parameters carried alongside each snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParams {
    /// Polygon grouping of the index array.
    pub kind: PolygonKind,
    /// Rasterisation mode.
    pub fill: FillMode,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            kind: PolygonKind::Triangles,
            fill: FillMode::Fill,
        }
    }
}

/// One renderable vertex: position, colour and normal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshVertex {
    /// Position.
    pub position: [f32; 3],
    /// RGB colour.
    pub color: [f32; 3],
    /// Unit normal.
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Create a vertex with a zero normal.
    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            color,
            normal: [0.0; 3],
        }
    }
}

/// One complete renderable snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Vertex array.
    pub vertices: Vec<MeshVertex>,
    /// Index array, grouped per `params.kind`.
    pub indices: Vec<u32>,
    /// Rendering parameters.
    pub params: BufferParams,
}

/// Notification that a vertex changed index during a swap-remove.
///
/// The owner cell must replace `from` with `to` in its vertex-id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexMove {
    /// The index the vertex used to have.
    pub from: u32,
    /// The index it has now.
    pub to: u32,
    /// The cell that owns the moved vertex.
    pub owner: CellKey,
}

/// Work-side bookkeeping not needed for rendering: the polygons each
/// vertex belongs to and the owning octree cell.
#[derive(Debug, Clone, Default)]
struct VertexData {
    /// Polygon ids referencing this vertex. Cascaded deletions iterate
    /// this set from the highest id down so swap-removed polygons never
    /// invalidate an id that is still pending.
    polygons: BTreeSet<u32>,
    owner: CellKey,
}

/// Shared handle the renderer uses to lock the render snapshot for one
/// frame.
pub type RenderHandle = Arc<Mutex<Snapshot>>;

/// The double-buffered geometry store.
pub struct GeometryBuffer {
    work: Snapshot,
    vertex_data: Vec<VertexData>,
    render: RenderHandle,
}

impl GeometryBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            work: Snapshot::default(),
            vertex_data: Vec::new(),
            render: Arc::new(Mutex::new(Snapshot::default())),
        }
    }

    /// Handle for the renderer; locking it holds the render side.
    pub fn render_handle(&self) -> RenderHandle {
        Arc::clone(&self.render)
    }

    /// Set the polygon grouping of the work side.
    pub fn set_polygon_kind(&mut self, kind: PolygonKind) {
        self.work.params.kind = kind;
    }

    /// Set the fill mode of the work side.
    pub fn set_fill_mode(&mut self, fill: FillMode) {
        self.work.params.fill = fill;
    }

    fn verts_per_polygon(&self) -> usize {
        self.work.params.kind.verts_per_polygon()
    }

    /// Number of vertices on the work side.
    pub fn vertex_count(&self) -> usize {
        self.work.vertices.len()
    }

    /// Number of polygons on the work side.
    pub fn polygon_count(&self) -> usize {
        self.work.indices.len() / self.verts_per_polygon()
    }

    /// Work-side vertices.
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.work.vertices
    }

    /// Work-side indices.
    pub fn indices(&self) -> &[u32] {
        &self.work.indices
    }

    /// The cell owning a work-side vertex.
    pub fn owner(&self, id: u32) -> CellKey {
        self.vertex_data[id as usize].owner
    }

    /// Append a vertex owned by `owner`; returns its index.
    pub fn add_vertex(&mut self, v: MeshVertex, owner: CellKey) -> u32 {
        let id = self.work.vertices.len() as u32;
        self.work.vertices.push(v);
        self.vertex_data.push(VertexData {
            polygons: BTreeSet::new(),
            owner,
        });
        debug_assert_eq!(self.work.vertices.len(), self.vertex_data.len());
        id
    }

    /// Overwrite a vertex normal.
    pub fn set_normal(&mut self, id: u32, normal: [f32; 3]) {
        self.work.vertices[id as usize].normal = normal;
    }

    /// Append a polygon and register it on each of its vertices; returns
    /// the polygon id.
    pub fn add_polygon(&mut self, verts: &[u32]) -> u32 {
        assert_eq!(verts.len(), self.verts_per_polygon());
        let polygon_id = (self.work.indices.len() / self.verts_per_polygon()) as u32;
        for &v in verts {
            self.work.indices.push(v);
            self.vertex_data[v as usize].polygons.insert(polygon_id);
        }
        polygon_id
    }

    /// Remove a polygon by swap-remove, renumbering the polygon that was
    /// moved into its slot on each of that polygon's vertices.
    pub fn remove_polygon(&mut self, polygon_id: u32) {
        let pv = self.verts_per_polygon();
        let idx = polygon_id as usize * pv;
        // unregister from this polygon's vertices
        for m in 0..pv {
            let v = self.work.indices[idx + m] as usize;
            self.vertex_data[v].polygons.remove(&polygon_id);
        }
        let last_index = self.work.indices.len() - pv;
        if idx != last_index {
            let last_polygon = (last_index / pv) as u32;
            for m in 0..pv {
                let v = self.work.indices[last_index + m];
                self.work.indices[idx + m] = v;
                let data = &mut self.vertex_data[v as usize];
                data.polygons.remove(&last_polygon);
                data.polygons.insert(polygon_id);
            }
        }
        self.work.indices.truncate(last_index);
    }

    /// Remove a vertex: first drop every polygon that references it, then
    /// swap-remove it. If another vertex was moved into the vacated slot,
    /// its polygons are renumbered here and the move is returned so the
    /// owning cell can update its stored id.
    pub fn remove_vertex(&mut self, id: u32) -> Option<VertexMove> {
        // cascade: highest polygon id first
        let polygons: Vec<u32> = self.vertex_data[id as usize]
            .polygons
            .iter()
            .rev()
            .copied()
            .collect();
        for p in polygons {
            self.remove_polygon(p);
        }
        debug_assert!(self.vertex_data[id as usize].polygons.is_empty());

        let last = (self.work.vertices.len() - 1) as u32;
        let mut moved = None;
        if id != last {
            self.work.vertices.swap(id as usize, last as usize);
            self.vertex_data.swap(id as usize, last as usize);
            // the vertex formerly at `last` now answers to `id`; its
            // polygons still reference the old index
            let pv = self.verts_per_polygon();
            let polys: Vec<u32> = self.vertex_data[id as usize].polygons.iter().copied().collect();
            for p in polys {
                let base = p as usize * pv;
                for m in 0..pv {
                    if self.work.indices[base + m] == last {
                        self.work.indices[base + m] = id;
                    }
                }
            }
            moved = Some(VertexMove {
                from: last,
                to: id,
                owner: self.vertex_data[id as usize].owner,
            });
        }
        self.work.vertices.truncate(last as usize);
        self.vertex_data.truncate(last as usize);
        moved
    }

    /// Exchange the render and work snapshots, then copy the new render
    /// side back into the work side so both hold the same geometry.
    ///
    /// Blocks while the renderer holds the render side; the exclusive
    /// `&mut self` is the work-side lock.
    pub fn swap(&mut self) {
        {
            let mut render = self.render.lock().expect("render lock poisoned");
            std::mem::swap(&mut *render, &mut self.work);
            self.work = render.clone();
        }
        log::trace!(
            "buffer swap: {} vertices, {} indices",
            self.work.vertices.len(),
            self.work.indices.len()
        );
    }
}

impl Default for GeometryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<CellKey> {
        let mut pool: SlotMap<CellKey, ()> = SlotMap::with_key();
        (0..n).map(|_| pool.insert(())).collect()
    }

    fn vertex(x: f32) -> MeshVertex {
        MeshVertex::new([x, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    #[test]
    fn test_add_vertex_and_polygon() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        let a = buf.add_vertex(vertex(0.0), k[0]);
        let b = buf.add_vertex(vertex(1.0), k[0]);
        let c = buf.add_vertex(vertex(2.0), k[0]);
        let p = buf.add_polygon(&[a, b, c]);
        assert_eq!(p, 0);
        assert_eq!(buf.vertex_count(), 3);
        assert_eq!(buf.polygon_count(), 1);
        assert_eq!(buf.indices(), &[0, 1, 2]);
    }

    #[test]
    fn test_remove_polygon_swaps_last() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        let v: Vec<u32> = (0..6).map(|i| buf.add_vertex(vertex(i as f32), k[0])).collect();
        buf.add_polygon(&[v[0], v[1], v[2]]);
        buf.add_polygon(&[v[3], v[4], v[5]]);
        buf.remove_polygon(0);
        assert_eq!(buf.polygon_count(), 1);
        // the second polygon moved into slot 0
        assert_eq!(buf.indices(), &[3, 4, 5]);
    }

    #[test]
    fn test_remove_vertex_cascades_polygons() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        let v: Vec<u32> = (0..4).map(|i| buf.add_vertex(vertex(i as f32), k[0])).collect();
        buf.add_polygon(&[v[0], v[1], v[2]]);
        buf.add_polygon(&[v[1], v[2], v[3]]);
        // removing v1 kills both polygons
        buf.remove_vertex(v[1]);
        assert_eq!(buf.polygon_count(), 0);
        assert_eq!(buf.vertex_count(), 3);
    }

    #[test]
    fn test_remove_vertex_reports_move() {
        let k = keys(2);
        let mut buf = GeometryBuffer::new();
        let a = buf.add_vertex(vertex(0.0), k[0]);
        let _b = buf.add_vertex(vertex(1.0), k[0]);
        let c = buf.add_vertex(vertex(2.0), k[1]);
        let moved = buf.remove_vertex(a).expect("c should move into slot 0");
        assert_eq!(moved.from, c);
        assert_eq!(moved.to, a);
        assert_eq!(moved.owner, k[1]);
        // no move when removing the last vertex
        assert!(buf.remove_vertex(1).is_none());
    }

    #[test]
    fn test_move_renumbers_polygons() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        let v: Vec<u32> = (0..5).map(|i| buf.add_vertex(vertex(i as f32), k[0])).collect();
        buf.add_polygon(&[v[2], v[3], v[4]]);
        // remove an unreferenced vertex; vertex 4 moves into slot 0
        let moved = buf.remove_vertex(v[0]).unwrap();
        assert_eq!(moved.to, 0);
        assert_eq!(buf.indices(), &[2, 3, 0]);
    }

    #[test]
    fn test_swap_publishes_and_resyncs() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        let a = buf.add_vertex(vertex(0.0), k[0]);
        let b = buf.add_vertex(vertex(1.0), k[0]);
        let c = buf.add_vertex(vertex(2.0), k[0]);
        buf.add_polygon(&[a, b, c]);
        let render = buf.render_handle();
        assert!(render.lock().unwrap().vertices.is_empty());
        buf.swap();
        assert_eq!(render.lock().unwrap().vertices.len(), 3);
        // the work side was resynchronised to match
        assert_eq!(buf.vertex_count(), 3);
        assert_eq!(buf.polygon_count(), 1);
    }

    #[test]
    fn test_render_lock_blocks_swap() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc as StdArc;

        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        buf.add_vertex(vertex(0.0), k[0]);
        let render = buf.render_handle();
        let swapped = StdArc::new(AtomicBool::new(false));

        let guard = render.lock().unwrap();
        let pre_swap_len = guard.vertices.len();
        let flag = StdArc::clone(&swapped);
        let handle = std::thread::spawn(move || {
            buf.swap();
            flag.store(true, Ordering::SeqCst);
            buf
        });
        // the swap cannot complete while this frame holds the render side
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!swapped.load(Ordering::SeqCst));
        assert_eq!(guard.vertices.len(), pre_swap_len);
        drop(guard);
        let buf = handle.join().unwrap();
        assert!(swapped.load(Ordering::SeqCst));
        assert_eq!(render.lock().unwrap().vertices.len(), 1);
        assert_eq!(buf.vertex_count(), 1);
    }

    #[test]
    fn test_wireframe_params() {
        let k = keys(1);
        let mut buf = GeometryBuffer::new();
        buf.set_polygon_kind(PolygonKind::Lines);
        buf.set_fill_mode(FillMode::Line);
        let a = buf.add_vertex(vertex(0.0), k[0]);
        let b = buf.add_vertex(vertex(1.0), k[0]);
        buf.add_polygon(&[a, b]);
        assert_eq!(buf.polygon_count(), 1);
        buf.swap();
        assert_eq!(buf.render_handle().lock().unwrap().params.kind, PolygonKind::Lines);
    }
}
