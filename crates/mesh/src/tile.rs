//! One tile of the global TIN: corner anchors, the triangle arena, the error
//! heap and the inserted-vertex arrays.

use std::mem;

use retin_geometry::{signed_area, Coord, Elev, Orientation, Point};
use thiserror::Error;

use crate::bucket::Bucket;
use crate::heap::{Empty, ErrorHeap};
use crate::store::{PointId, PointStore, TriId, TriSlot, TriState, TriStore};

/// Tiles larger than this per side start with a fixed-size heap and grow on
/// demand; smaller ones get an exact power-of-two fit up front.
const UNTILED_SIDE: usize = 4000;
const UNTILED_HEAP_CAPACITY: usize = 1 << 20;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("degenerate triangle ({a:?}, {b:?}, {c:?})")]
    DegenerateTriangle { a: Point, b: Point, c: Point },
    #[error("sample {sample:?} fell outside every replacement triangle")]
    SampleOutsideTriangle { sample: Point },
    #[error("neighbour link across edge {a:?}-{b:?} is inconsistent")]
    BrokenLink { a: Point, b: Point },
}

/// The index rectangle `[i_offset, i_offset + nrows) x [j_offset, j_offset +
/// ncols)` a tile covers. Row and column extremes classify boundary points
/// and edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileBounds {
    pub i_offset: Coord,
    pub j_offset: Coord,
    pub nrows: Coord,
    pub ncols: Coord,
}

impl TileBounds {
    pub fn max_row(&self) -> Coord {
        self.i_offset + self.nrows - 1
    }

    pub fn max_col(&self) -> Coord {
        self.j_offset + self.ncols - 1
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.i_offset && p.x <= self.max_row() && p.y >= self.j_offset && p.y <= self.max_col()
    }

    pub fn on_boundary(&self, p: Point) -> bool {
        p.x == self.i_offset || p.x == self.max_row() || p.y == self.j_offset || p.y == self.max_col()
    }

    /// An edge lies on the tile boundary iff both endpoints sit on the same
    /// extreme row or the same extreme column.
    pub fn edge_on_boundary(&self, p: Point, q: Point) -> bool {
        (p.x == self.i_offset && q.x == self.i_offset)
            || (p.x == self.max_row() && q.x == self.max_row())
            || (p.y == self.j_offset && q.y == self.j_offset)
            || (p.y == self.max_col() && q.y == self.max_col())
    }
}

/// The distinguished lower-left triangle, vertex and edge that root the tile
/// traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub tri: TriId,
    pub vertex: PointId,
    pub edge: (PointId, PointId),
}

/// The ordered vertices one tile placed on one of its boundaries, including
/// the two corner points, sorted by `(row, column)`. Consumed by the
/// neighbouring tile's replay step and by the mesh writer's vertex indexing.
#[derive(Clone, Debug)]
pub struct BoundaryStrip(Vec<Point>);

impl BoundaryStrip {
    pub fn new(points: Vec<Point>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].position() < w[1].position()));
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// The strip without its two corner points.
    pub fn inner(&self) -> &[Point] {
        if self.0.len() <= 2 {
            &[]
        } else {
            &self.0[1..self.0.len() - 1]
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Triangulation of one tile rectangle.
///
/// Freshly constructed, it holds the four corner points with placeholder
/// elevations and two triangles sharing the nw-se diagonal. The refiner
/// inserts vertices and restores the Delaunay property through the primitive
/// operations below; the mesh maintains the heap, the inserted-vertex arrays
/// and the traversal anchor.
#[derive(Debug)]
pub struct TileMesh {
    bounds: TileBounds,
    points: PointStore,
    tris: TriStore,
    heap: ErrorHeap,
    anchor: Anchor,
    corners: [PointId; 4],
    interior: Vec<PointId>,
    right: Vec<PointId>,
    bottom: Vec<PointId>,
}

impl TileMesh {
    pub fn new(bounds: TileBounds) -> Self {
        debug_assert!(bounds.nrows >= 2 && bounds.ncols >= 2, "tile too small");

        let mut points = PointStore::new();
        let nw = points.push(Point::new(bounds.i_offset, bounds.j_offset, 0));
        let ne = points.push(Point::new(bounds.i_offset, bounds.max_col(), 0));
        let sw = points.push(Point::new(bounds.max_row(), bounds.j_offset, 0));
        let se = points.push(Point::new(bounds.max_row(), bounds.max_col(), 0));

        let mut tris = TriStore::new();
        let first = tris.push(TriSlot {
            verts: [nw, sw, se],
            nbrs: [None; 3],
            state: TriState::Settled,
            heap_pos: None,
        });
        let second = tris.push(TriSlot {
            verts: [nw, ne, se],
            nbrs: [None, Some(first), None],
            state: TriState::Settled,
            heap_pos: None,
        });
        // Shared diagonal nw-se is first's edge (v0, v2).
        tris.get_mut(first).nbrs[1] = Some(second);

        let side = bounds.nrows.max(bounds.ncols) as usize;
        let capacity = if side >= UNTILED_SIDE {
            UNTILED_HEAP_CAPACITY
        } else {
            (3 * side * side).next_power_of_two()
        };

        Self {
            bounds,
            points,
            tris,
            heap: ErrorHeap::with_capacity(capacity),
            anchor: Anchor {
                tri: first,
                vertex: sw,
                edge: (nw, sw),
            },
            corners: [nw, ne, sw, se],
            interior: vec![nw],
            right: vec![ne, se],
            bottom: vec![sw, se],
        }
    }

    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn nw(&self) -> PointId {
        self.corners[0]
    }

    pub fn ne(&self) -> PointId {
        self.corners[1]
    }

    pub fn sw(&self) -> PointId {
        self.corners[2]
    }

    pub fn se(&self) -> PointId {
        self.corners[3]
    }

    pub fn point(&self, id: PointId) -> Point {
        self.points.get(id)
    }

    pub fn add_point(&mut self, point: Point) -> PointId {
        debug_assert!(self.bounds.contains(point));
        self.points.push(point)
    }

    pub fn set_point_z(&mut self, id: PointId, z: Elev) {
        self.points.set_z(id, z);
    }

    pub fn vertices(&self, t: TriId) -> [PointId; 3] {
        self.tris.get(t).verts
    }

    pub fn vertex_points(&self, t: TriId) -> [Point; 3] {
        self.vertices(t).map(|v| self.point(v))
    }

    pub fn is_tombstoned(&self, t: TriId) -> bool {
        self.tris.is_tombstoned(t)
    }

    pub fn has_bucket(&self, t: TriId) -> bool {
        matches!(self.tris.get(t).state, TriState::Pending(_))
    }

    /// The queued sample of largest error, with that error.
    pub fn worst_sample(&self, t: TriId) -> Option<(Point, f64)> {
        match &self.tris.get(t).state {
            TriState::Pending(bucket) => bucket.worst(),
            _ => None,
        }
    }

    pub fn num_triangles(&self) -> u32 {
        self.tris.live_count()
    }

    /// Total arena slots, tombstones included. Dense per-triangle side tables
    /// can be keyed by `TriId::index` up to this bound.
    pub fn slot_count(&self) -> usize {
        self.tris.slot_count()
    }

    pub fn live_triangles(&self) -> impl Iterator<Item = TriId> + '_ {
        self.tris.live_ids()
    }

    /// Create a triangle with the given neighbours across the edges
    /// `(p1, p2)`, `(p1, p3)` and `(p2, p3)`, wiring the symmetric links
    /// back from every neighbour. Neighbours passed across a tile-boundary
    /// edge are discarded; such edges never carry a link.
    pub fn add_triangle(
        &mut self,
        p1: PointId,
        p2: PointId,
        p3: PointId,
        neighbours: [Option<TriId>; 3],
    ) -> Result<TriId, MeshError> {
        let (a, b, c) = (self.point(p1), self.point(p2), self.point(p3));
        if signed_area(a, b, c) == Orientation::Collinear {
            return Err(MeshError::DegenerateTriangle { a, b, c });
        }
        debug_assert!(
            self.bounds.contains(a) && self.bounds.contains(b) && self.bounds.contains(c)
        );

        let mut slot = TriSlot {
            verts: [p1, p2, p3],
            nbrs: neighbours,
            state: TriState::Settled,
            heap_pos: None,
        };
        for i in 0..3 {
            let (pa, pb) = slot.edge(i);
            if self.bounds.edge_on_boundary(self.point(pa), self.point(pb)) {
                slot.nbrs[i] = None;
            }
        }

        let id = self.tris.push(slot);
        for i in 0..3 {
            let (pa, pb) = self.tris.get(id).edge(i);
            if let Some(n) = self.tris.get(id).nbrs[i] {
                self.set_neighbour(n, pa, pb, Some(id));
            }
        }
        Ok(id)
    }

    /// The triangle on the other side of edge `a`-`b` of `t`. Tile-boundary
    /// edges have no other side.
    pub fn neighbour_across(&self, t: TriId, a: PointId, b: PointId) -> Option<TriId> {
        if self.bounds.edge_on_boundary(self.point(a), self.point(b)) {
            return None;
        }
        let slot = self.tris.get(t);
        let index = slot.edge_index(a, b);
        debug_assert!(index.is_some(), "queried edge does not belong to triangle");
        index.and_then(|i| slot.nbrs[i])
    }

    pub(crate) fn set_neighbour(&mut self, t: TriId, a: PointId, b: PointId, n: Option<TriId>) {
        let slot = self.tris.get_mut(t);
        match slot.edge_index(a, b) {
            Some(i) => slot.nbrs[i] = n,
            None => debug_assert!(false, "linked edge does not belong to triangle"),
        }
    }

    /// The vertex of `t` that is neither `a` nor `b`.
    pub fn third_vertex(&self, t: TriId, a: PointId, b: PointId) -> PointId {
        let [v0, v1, v2] = self.vertices(t);
        if v0 != a && v0 != b {
            v0
        } else if v1 != a && v1 != b {
            v1
        } else {
            v2
        }
    }

    /// Attach a bucket of samples to `t` without queueing it. Used while a
    /// tile is being seeded and replayed, before the settle-or-queue decision
    /// is made.
    pub fn attach_bucket(&mut self, t: TriId, bucket: Bucket) {
        debug_assert!(!bucket.is_empty());
        let slot = self.tris.get_mut(t);
        debug_assert!(matches!(slot.state, TriState::Settled));
        slot.state = TriState::Pending(bucket);
    }

    /// Queue a triangle that already carries a bucket.
    pub fn enqueue(&mut self, t: TriId) {
        debug_assert!(self.has_bucket(t));
        self.heap.insert(&mut self.tris, t);
    }

    /// Is `t` currently in the heap?
    pub fn is_queued(&self, t: TriId) -> bool {
        self.tris.get(t).heap_pos.is_some()
    }

    /// Attach a bucket and queue the triangle in one step. The caller has
    /// already decided the bucket's worst error exceeds tolerance.
    pub fn install_bucket(&mut self, t: TriId, bucket: Bucket) {
        self.attach_bucket(t, bucket);
        self.heap.insert(&mut self.tris, t);
    }

    /// Detach and return `t`'s bucket, settling the slot. Does not touch the
    /// heap; callers tombstone or re-queue the triangle afterwards.
    pub fn take_bucket(&mut self, t: TriId) -> Option<Bucket> {
        let slot = self.tris.get_mut(t);
        match mem::replace(&mut slot.state, TriState::Settled) {
            TriState::Pending(bucket) => Some(bucket),
            other => {
                slot.state = other;
                None
            }
        }
    }

    /// Retire a triangle replaced by a split or flip: drop its bucket, clear
    /// its links, remove it from the heap.
    pub fn tombstone(&mut self, t: TriId) {
        if let Some(pos) = self.tris.get(t).heap_pos {
            self.heap.remove(&mut self.tris, pos);
        }
        self.tris.tombstone(t);
    }

    pub fn heap_extract(&mut self) -> Result<TriId, Empty> {
        self.heap.extract(&mut self.tris)
    }

    pub fn heap_peek(&self) -> Result<TriId, Empty> {
        self.heap.peek()
    }

    pub fn heap_is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Record a freshly promoted vertex in the bottom, right or interior
    /// array according to its position. The four corners are pre-recorded at
    /// construction.
    pub fn record_vertex(&mut self, id: PointId) {
        let p = self.point(id);
        if p.x == self.bounds.max_row() {
            self.bottom.push(id);
        } else if p.y == self.bounds.max_col() {
            self.right.push(id);
        } else {
            self.interior.push(id);
        }
    }

    /// Sort the inserted-vertex arrays by position. Must run once after
    /// refinement, before the tile is written or its strips exported.
    pub fn finalize(&mut self) {
        let points = &self.points;
        self.interior.sort_by_key(|&id| points.get(id).position());
        self.right.sort_by_key(|&id| points.get(id).position());
        self.bottom.sort_by_key(|&id| points.get(id).position());
    }

    pub fn interior_points(&self) -> Vec<Point> {
        self.interior.iter().map(|&id| self.points.get(id)).collect()
    }

    pub fn right_points(&self) -> Vec<Point> {
        self.right.iter().map(|&id| self.points.get(id)).collect()
    }

    pub fn bottom_points(&self) -> Vec<Point> {
        self.bottom.iter().map(|&id| self.points.get(id)).collect()
    }

    pub fn right_strip(&self) -> BoundaryStrip {
        BoundaryStrip::new(self.right_points())
    }

    pub fn bottom_strip(&self) -> BoundaryStrip {
        BoundaryStrip::new(self.bottom_points())
    }

    /// After the anchor triangle was replaced, pick the replacement that owns
    /// the lower-left edge: the one with two minimum-column vertices whose
    /// edge contains the maximum-row vertex.
    pub fn update_anchor(&mut self, candidates: &[TriId]) {
        let j0 = self.bounds.j_offset;
        let max_row = self.bounds.max_row();
        for &t in candidates {
            let vs = self.vertices(t);
            for (ia, ib) in [(0, 1), (0, 2), (1, 2)] {
                let (pa, pb) = (vs[ia], vs[ib]);
                let (a, b) = (self.point(pa), self.point(pb));
                if a.y != j0 || b.y != j0 {
                    continue;
                }
                if a.x == max_row {
                    self.anchor = Anchor { tri: t, vertex: pa, edge: (pa, pb) };
                } else if b.x == max_row {
                    self.anchor = Anchor { tri: t, vertex: pb, edge: (pa, pb) };
                }
            }
        }
    }

    /// Structural self-check: no degenerate triangle, neighbour links
    /// symmetric, no link across a tile-boundary edge.
    pub fn validate(&self) -> Result<(), MeshError> {
        for t in self.tris.live_ids() {
            let [a, b, c] = self.vertex_points(t);
            if signed_area(a, b, c) == Orientation::Collinear {
                return Err(MeshError::DegenerateTriangle { a, b, c });
            }
            let slot = self.tris.get(t);
            for i in 0..3 {
                let (pa, pb) = slot.edge(i);
                let (qa, qb) = (self.point(pa), self.point(pb));
                match slot.nbrs[i] {
                    None => {}
                    Some(_) if self.bounds.edge_on_boundary(qa, qb) => {
                        return Err(MeshError::BrokenLink { a: qa, b: qb });
                    }
                    Some(n) => {
                        if self.tris.is_tombstoned(n) {
                            return Err(MeshError::BrokenLink { a: qa, b: qb });
                        }
                        let back = self
                            .tris
                            .get(n)
                            .edge_index(pa, pb)
                            .and_then(|j| self.tris.get(n).nbrs[j]);
                        if back != Some(t) {
                            return Err(MeshError::BrokenLink { a: qa, b: qb });
                        }
                    }
                }
            }
        }
        if self.tris.is_tombstoned(self.anchor.tri) {
            let (a, b) = self.anchor.edge;
            return Err(MeshError::BrokenLink {
                a: self.point(a),
                b: self.point(b),
            });
        }
        Ok(())
    }
}

/// Side length of a tile that fits the per-tile working set (triangles, heap
/// slots and points, roughly two of each per raster sample) into `mem_mb`
/// megabytes.
pub fn tile_len_for_memory(mem_mb: f64) -> usize {
    let per_sample = 2 * (mem::size_of::<TriSlot>() + mem::size_of::<TriId>() + mem::size_of::<Point>());
    let bytes = mem_mb * 1024.0 * 1024.0;
    let side = (bytes / per_sample as f64).sqrt() as usize;
    side.clamp(2, Coord::MAX as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds4() -> TileBounds {
        TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 }
    }

    #[test]
    fn test_initial_mesh() {
        let mesh = TileMesh::new(bounds4());
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.point(mesh.nw()), Point::new(0, 0, 0));
        assert_eq!(mesh.point(mesh.ne()), Point::new(0, 3, 0));
        assert_eq!(mesh.point(mesh.sw()), Point::new(3, 0, 0));
        assert_eq!(mesh.point(mesh.se()), Point::new(3, 3, 0));

        let anchor = mesh.anchor();
        assert_eq!(anchor.vertex, mesh.sw());
        assert_eq!(anchor.edge, (mesh.nw(), mesh.sw()));

        let second = mesh
            .neighbour_across(anchor.tri, mesh.nw(), mesh.se())
            .expect("diagonal neighbour");
        assert_eq!(
            mesh.neighbour_across(second, mesh.nw(), mesh.se()),
            Some(anchor.tri)
        );
        // Boundary edges carry no links.
        assert_eq!(mesh.neighbour_across(anchor.tri, mesh.nw(), mesh.sw()), None);
        assert_eq!(mesh.neighbour_across(second, mesh.ne(), mesh.se()), None);

        mesh.validate().unwrap();
    }

    #[test]
    fn test_boundary_classification() {
        let b = TileBounds { i_offset: 3, j_offset: 6, nrows: 4, ncols: 5 };
        assert!(b.contains(Point::new(3, 6, 0)));
        assert!(b.contains(Point::new(6, 10, 0)));
        assert!(!b.contains(Point::new(7, 6, 0)));

        assert!(b.on_boundary(Point::new(3, 8, 0)));
        assert!(b.on_boundary(Point::new(5, 10, 0)));
        assert!(!b.on_boundary(Point::new(4, 8, 0)));

        // Same extreme row or column.
        assert!(b.edge_on_boundary(Point::new(3, 7, 0), Point::new(3, 9, 0)));
        assert!(b.edge_on_boundary(Point::new(4, 6, 0), Point::new(6, 6, 0)));
        assert!(b.edge_on_boundary(Point::new(6, 7, 0), Point::new(6, 9, 0)));
        assert!(b.edge_on_boundary(Point::new(4, 10, 0), Point::new(5, 10, 0)));
        // Crossing the interior or touching different boundaries.
        assert!(!b.edge_on_boundary(Point::new(3, 6, 0), Point::new(6, 10, 0)));
        assert!(!b.edge_on_boundary(Point::new(3, 8, 0), Point::new(6, 8, 0)));
    }

    #[test]
    fn test_add_triangle_rejects_degenerate() {
        let mut mesh = TileMesh::new(bounds4());
        let a = mesh.add_point(Point::new(1, 1, 0));
        let b = mesh.add_point(Point::new(2, 2, 0));
        let err = mesh.add_triangle(a, b, mesh.nw(), [None; 3]).unwrap_err();
        assert!(matches!(err, MeshError::DegenerateTriangle { .. }));
    }

    #[test]
    fn test_interior_split_keeps_links_symmetric() {
        let mut mesh = TileMesh::new(bounds4());
        let first = mesh.anchor().tri;
        let [p1, p2, p3] = mesh.vertices(first);
        let p = mesh.add_point(Point::new(2, 1, 5));

        let n12 = mesh.neighbour_across(first, p1, p2);
        let t1 = mesh.add_triangle(p1, p2, p, [n12, None, None]).unwrap();
        let n13 = mesh.neighbour_across(first, p1, p3);
        let t2 = mesh.add_triangle(p1, p, p3, [Some(t1), n13, None]).unwrap();
        let n23 = mesh.neighbour_across(first, p2, p3);
        let t3 = mesh
            .add_triangle(p, p2, p3, [Some(t1), Some(t2), n23])
            .unwrap();
        mesh.update_anchor(&[t1, t2, t3]);
        mesh.tombstone(first);

        assert_eq!(mesh.num_triangles(), 4);
        assert!(mesh.is_tombstoned(first));
        assert_eq!(mesh.neighbour_across(t1, p1, p), Some(t2));
        assert_eq!(mesh.neighbour_across(t2, p, p3), Some(t3));
        assert_eq!(mesh.neighbour_across(t3, p, p2), Some(t1));
        mesh.validate().unwrap();
    }

    #[test]
    fn test_update_anchor_picks_lower_left_child() {
        let mut mesh = TileMesh::new(bounds4());
        let first = mesh.anchor().tri;
        let (nw, sw, se) = (mesh.nw(), mesh.sw(), mesh.se());

        // Split the anchor triangle at a point on its left edge.
        let p = mesh.add_point(Point::new(2, 0, 9));
        let n_nwse = mesh.neighbour_across(first, nw, se);
        let t1 = mesh.add_triangle(nw, p, se, [None, n_nwse, None]).unwrap();
        let t2 = mesh.add_triangle(p, se, sw, [Some(t1), None, None]).unwrap();
        mesh.update_anchor(&[t1, t2]);
        mesh.tombstone(first);

        let anchor = mesh.anchor();
        assert_eq!(anchor.tri, t2);
        assert_eq!(anchor.vertex, sw);
        assert_eq!(
            (mesh.point(anchor.edge.0), mesh.point(anchor.edge.1)),
            (Point::new(2, 0, 9), Point::new(3, 0, 0))
        );
        mesh.validate().unwrap();
    }

    #[test]
    fn test_record_vertex_routing() {
        let mut mesh = TileMesh::new(bounds4());
        let interior = mesh.add_point(Point::new(1, 1, 1));
        let right = mesh.add_point(Point::new(1, 3, 2));
        let bottom = mesh.add_point(Point::new(3, 2, 3));
        mesh.record_vertex(interior);
        mesh.record_vertex(right);
        mesh.record_vertex(bottom);
        mesh.finalize();

        assert_eq!(
            mesh.interior_points(),
            vec![Point::new(0, 0, 0), Point::new(1, 1, 1)]
        );
        assert_eq!(
            mesh.right_points(),
            vec![Point::new(0, 3, 0), Point::new(1, 3, 2), Point::new(3, 3, 0)]
        );
        assert_eq!(
            mesh.bottom_points(),
            vec![Point::new(3, 0, 0), Point::new(3, 2, 3), Point::new(3, 3, 0)]
        );
        assert_eq!(mesh.right_strip().inner(), &[Point::new(1, 3, 2)]);
        assert_eq!(mesh.bottom_strip().inner(), &[Point::new(3, 2, 3)]);
    }

    #[test]
    fn test_bucket_and_heap_lifecycle() {
        let mut mesh = TileMesh::new(bounds4());
        let first = mesh.anchor().tri;
        let second = mesh.neighbour_across(first, mesh.nw(), mesh.se()).unwrap();

        let mut bucket = Bucket::new();
        bucket.push(Point::new(2, 1, 9), 9.0);
        mesh.install_bucket(first, bucket);
        let mut bucket = Bucket::new();
        bucket.push(Point::new(1, 2, 4), 4.0);
        mesh.install_bucket(second, bucket);

        assert_eq!(mesh.heap_len(), 2);
        assert_eq!(mesh.heap_peek(), Ok(first));
        assert_eq!(mesh.heap_extract(), Ok(first));
        assert_eq!(mesh.worst_sample(second), Some((Point::new(1, 2, 4), 4.0)));

        // Tombstoning a queued triangle pulls it out of the heap.
        mesh.tombstone(second);
        assert!(mesh.heap_is_empty());
        assert_eq!(mesh.heap_extract(), Err(Empty));
    }

    #[test]
    fn test_tile_len_for_memory() {
        let small = tile_len_for_memory(1.0);
        let large = tile_len_for_memory(250.0);
        assert!(small >= 2);
        assert!(small < large);
        assert!(large <= Coord::MAX as usize);
    }
}
