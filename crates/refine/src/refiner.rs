//! The per-tile refinement loop.
//!
//! After seeding, every non-corner sample of the tile sits in the bucket of
//! one of the two initial triangles and any triangle with approximation error
//! is queued. The loop then greedily promotes the worst-approximated sample
//! to a vertex: the containing triangle is split one-to-three (or one-to-two
//! on each side of an edge when the sample is collinear with it), the parent
//! buckets are redistributed over the replacements, and the Delaunay property
//! is restored by recursive edge flips that never cross a tile boundary.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use retin_geometry::{
    in_circumcircle, in_triangle, sample_error, signed_area, Elev, Orientation, Point,
};
use retin_mesh::{BoundaryStrip, Bucket, Empty, PointId, TileMesh, TriId};

use crate::RefineError;

#[derive(Debug, Default)]
pub(crate) struct RefineStats {
    pub(crate) promoted: u32,
    pub(crate) flips: u32,
    /// Errors in extraction order, for monotonicity checks and diagnostics.
    pub(crate) extracted_errors: Vec<f64>,
}

pub(crate) struct Refiner<'a> {
    mesh: &'a mut TileMesh,
    epsilon: f64,
    delaunay: bool,
    nodata: Elev,
    use_nodata: bool,
    min_elev: Elev,
    stats: RefineStats,
}

impl<'a> Refiner<'a> {
    pub(crate) fn new(
        mesh: &'a mut TileMesh,
        epsilon: f64,
        delaunay: bool,
        nodata: Elev,
        use_nodata: bool,
        min_elev: Elev,
    ) -> Self {
        Self {
            mesh,
            epsilon,
            delaunay,
            nodata,
            use_nodata,
            min_elev,
            stats: RefineStats::default(),
        }
    }

    pub(crate) fn into_stats(self) -> RefineStats {
        self.stats
    }

    /// Stream the tile's sample shard: assign the four corner elevations,
    /// then distribute every remaining sample over the two initial
    /// triangles. Samples on the top and left edges of an interior tile are
    /// skipped, those vertices arrive through boundary replay. Nodata
    /// samples are dropped, or remapped below the elevation minimum when
    /// requested.
    pub(crate) fn seed<R: Read>(&mut self, reader: &mut R) -> Result<(), RefineError> {
        let b = self.mesh.bounds();
        let (nw, ne, sw, se) = (self.mesh.nw(), self.mesh.ne(), self.mesh.sw(), self.mesh.se());

        let mut samples: Vec<Point> = Vec::new();
        let mut nodata_dropped = 0u64;
        for row in 0..b.nrows {
            let x = b.i_offset + row;
            for col in 0..b.ncols {
                let y = b.j_offset + col;
                let z = reader
                    .read_i16::<LittleEndian>()
                    .map_err(|source| RefineError::Shard { source })?;
                if row == 0 && col == 0 {
                    self.mesh.set_point_z(nw, z);
                    continue;
                }
                if row == 0 && col == b.ncols - 1 {
                    self.mesh.set_point_z(ne, z);
                    continue;
                }
                if row == b.nrows - 1 && col == b.ncols - 1 {
                    self.mesh.set_point_z(se, z);
                    continue;
                }
                if row == b.nrows - 1 && col == 0 {
                    self.mesh.set_point_z(sw, z);
                    continue;
                }
                // Supplied by the top and left neighbours on interior tiles.
                if b.i_offset != 0 && row == 0 {
                    continue;
                }
                if b.j_offset != 0 && col == 0 {
                    continue;
                }
                let z = if z == self.nodata {
                    if !self.use_nodata {
                        nodata_dropped += 1;
                        continue;
                    }
                    self.min_elev.saturating_sub(1)
                } else {
                    z
                };
                samples.push(Point::new(x, y, z));
            }
        }
        if nodata_dropped > 0 {
            warn!(
                count = nodata_dropped,
                i_offset = b.i_offset,
                j_offset = b.j_offset,
                "dropped nodata samples"
            );
        }

        let first = self.mesh.anchor().tri;
        let second = self
            .mesh
            .neighbour_across(first, nw, se)
            .expect("fresh tile has two triangles");
        let fp = self.mesh.vertex_points(first);
        let sp = self.mesh.vertex_points(second);
        let mut first_bucket = Bucket::new();
        let mut second_bucket = Bucket::new();
        for sample in samples {
            if in_triangle(fp[0], fp[1], fp[2], sample) {
                first_bucket.push(sample, sample_error(sample, fp[0], fp[1], fp[2]));
            } else {
                debug_assert!(in_triangle(sp[0], sp[1], sp[2], sample));
                second_bucket.push(sample, sample_error(sample, sp[0], sp[1], sp[2]));
            }
        }
        // Attached but not yet queued: boundary replay must see these
        // samples before the settle-or-queue decision is made, otherwise a
        // replayed seam vertex could distort an already settled triangle
        // with nothing left to witness the error.
        for (tri, bucket) in [(first, first_bucket), (second, second_bucket)] {
            if !bucket.is_empty() {
                self.mesh.attach_bucket(tri, bucket);
            }
        }
        Ok(())
    }

    /// Re-insert the boundary vertices the top and left neighbours placed on
    /// the shared seams, so both sides triangulate the seam identically. No
    /// Delaunay flips are performed here.
    pub(crate) fn replay(
        &mut self,
        left: Option<&BoundaryStrip>,
        top: Option<&BoundaryStrip>,
    ) -> Result<(), RefineError> {
        let first = self.mesh.anchor().tri;
        let second = self
            .mesh
            .neighbour_across(first, self.mesh.nw(), self.mesh.se())
            .expect("fresh tile has two triangles");
        if let Some(strip) = left {
            self.replay_chain(first, strip)?;
        }
        if let Some(strip) = top {
            self.replay_chain(second, strip)?;
        }
        Ok(())
    }

    /// Split the successive lowest boundary triangle at each strip vertex.
    /// `start`'s first edge must span the boundary the strip lies on, which
    /// holds for the two initial triangles; each split's second child spans
    /// the rest of the boundary and becomes the next split target.
    fn replay_chain(&mut self, start: TriId, strip: &BoundaryStrip) -> Result<(), RefineError> {
        let mut s = start;
        for &v in strip.inner() {
            let vs = self.mesh.vertices(s);
            debug_assert!(self
                .mesh
                .bounds()
                .edge_on_boundary(self.mesh.point(vs[0]), self.mesh.point(vs[1])));
            let p = self.mesh.add_point(v);

            let n13 = self.mesh.neighbour_across(s, vs[0], vs[2]);
            let t1 = self.mesh.add_triangle(vs[0], p, vs[2], [None, n13, None])?;
            let n23 = self.mesh.neighbour_across(s, vs[1], vs[2]);
            let t2 = self
                .mesh
                .add_triangle(p, vs[1], vs[2], [None, Some(t1), n23])?;

            if s == self.mesh.anchor().tri {
                self.mesh.update_anchor(&[t1, t2]);
            }
            if self.mesh.has_bucket(s) {
                self.redistribute(&[s], &[t1, t2], None)?;
            }
            self.mesh.tombstone(s);
            s = t2;
        }
        Ok(())
    }

    /// Settle or queue the triangles still holding their seeding buckets.
    /// Replay children have already been decided during redistribution.
    fn queue_seeded(&mut self) {
        let mesh = &*self.mesh;
        let undecided: Vec<TriId> = mesh
            .live_triangles()
            .filter(|&t| mesh.has_bucket(t) && !mesh.is_queued(t))
            .collect();
        for t in undecided {
            if self
                .mesh
                .worst_sample(t)
                .is_some_and(|(_, error)| error > self.epsilon)
            {
                self.mesh.enqueue(t);
            } else {
                drop(self.mesh.take_bucket(t));
            }
        }
    }

    /// The main loop: promote the worst-approximated sample until every
    /// triangle is within tolerance.
    pub(crate) fn run(&mut self) -> Result<(), RefineError> {
        self.queue_seeded();
        loop {
            let s = match self.mesh.heap_extract() {
                Ok(s) => s,
                Err(Empty) => break,
            };
            if self.mesh.is_tombstoned(s) {
                debug!("skipping tombstoned triangle from the heap");
                continue;
            }
            let (worst, error) = self
                .mesh
                .worst_sample(s)
                .expect("queued triangle has samples");
            self.stats.extracted_errors.push(error);

            let p = self.mesh.add_point(worst);
            self.mesh.record_vertex(p);
            self.stats.promoted += 1;

            let [p1, p2, p3] = self.mesh.vertices(s);
            let [a, b, c] = self.mesh.vertex_points(s);
            if signed_area(a, b, worst) == Orientation::Collinear {
                self.split_collinear(s, p1, p2, p3, p)?;
            } else if signed_area(a, worst, c) == Orientation::Collinear {
                self.split_collinear(s, p1, p3, p2, p)?;
            } else if signed_area(worst, b, c) == Orientation::Collinear {
                self.split_collinear(s, p2, p3, p1, p)?;
            } else {
                self.split_interior(s, p)?;
            }
        }
        Ok(())
    }

    /// One-to-three split of `s` at the strictly interior vertex `p`.
    fn split_interior(&mut self, s: TriId, p: PointId) -> Result<(), RefineError> {
        let [p1, p2, p3] = self.mesh.vertices(s);

        let n12 = self.mesh.neighbour_across(s, p1, p2);
        let t1 = self.mesh.add_triangle(p1, p2, p, [n12, None, None])?;
        let n13 = self.mesh.neighbour_across(s, p1, p3);
        let t2 = self.mesh.add_triangle(p1, p, p3, [Some(t1), n13, None])?;
        let n23 = self.mesh.neighbour_across(s, p2, p3);
        let t3 = self
            .mesh
            .add_triangle(p, p2, p3, [Some(t1), Some(t2), n23])?;

        if s == self.mesh.anchor().tri {
            self.mesh.update_anchor(&[t1, t2, t3]);
        }
        self.redistribute(&[s], &[t1, t2, t3], Some(self.mesh.point(p)))?;
        self.mesh.tombstone(s);

        if self.delaunay {
            // Check the three inherited outer edges; the new edges all end in
            // the vertex just inserted and cannot be illegal.
            self.enforce_delaunay(t1, p1, p2, p)?;
            self.enforce_delaunay(t2, p1, p3, p)?;
            self.enforce_delaunay(t3, p2, p3, p)?;
        }
        Ok(())
    }

    /// Split when the promoted vertex `p` lies on edge `pa`-`pb` of `s`
    /// (`pc` is the off-edge vertex): two triangles replace `s`, and when a
    /// neighbour shares the split edge it is split in two as well.
    fn split_collinear(
        &mut self,
        s: TriId,
        pa: PointId,
        pb: PointId,
        pc: PointId,
        p: PointId,
    ) -> Result<(), RefineError> {
        let nac = self.mesh.neighbour_across(s, pa, pc);
        let t1 = self.mesh.add_triangle(pa, p, pc, [None, nac, None])?;
        let nbc = self.mesh.neighbour_across(s, pb, pc);
        let t2 = self.mesh.add_triangle(p, pc, pb, [Some(t1), None, nbc])?;

        if s == self.mesh.anchor().tri {
            self.mesh.update_anchor(&[t1, t2]);
        }
        self.redistribute(&[s], &[t1, t2], Some(self.mesh.point(p)))?;

        let sp = self.mesh.neighbour_across(s, pa, pb);
        self.mesh.tombstone(s);

        let mut far = None;
        if let Some(sp) = sp {
            let pd = self.mesh.third_vertex(sp, pa, pb);
            let nda = self.mesh.neighbour_across(sp, pd, pa);
            let t3 = self.mesh.add_triangle(pa, p, pd, [Some(t1), nda, None])?;
            let ndb = self.mesh.neighbour_across(sp, pd, pb);
            let t4 = self
                .mesh
                .add_triangle(pb, p, pd, [Some(t2), ndb, Some(t3)])?;

            if sp == self.mesh.anchor().tri {
                self.mesh.update_anchor(&[t3, t4]);
            }
            if self.mesh.has_bucket(sp) {
                self.redistribute(&[sp], &[t3, t4], Some(self.mesh.point(p)))?;
            }
            self.mesh.tombstone(sp);
            far = Some((t3, t4, pd));
        }

        if self.delaunay {
            self.enforce_delaunay(t1, pa, pc, p)?;
            self.enforce_delaunay(t2, pc, pb, p)?;
            if let Some((t3, t4, pd)) = far {
                self.enforce_delaunay(t3, pa, pd, p)?;
                self.enforce_delaunay(t4, pb, pd, p)?;
            }
        }
        Ok(())
    }

    /// Restore the Delaunay property across edge `p1`-`p2` of `t`, whose
    /// opposite vertex is `p3`. Boundary edges are never flipped, so tiles
    /// stay independent and seams are constrained-Delaunay only.
    fn enforce_delaunay(
        &mut self,
        t: TriId,
        p1: PointId,
        p2: PointId,
        p3: PointId,
    ) -> Result<(), RefineError> {
        if self.mesh.is_tombstoned(t) {
            return Ok(());
        }
        let (a, b) = (self.mesh.point(p1), self.mesh.point(p2));
        if self.mesh.bounds().edge_on_boundary(a, b) {
            return Ok(());
        }
        let Some(tn) = self.mesh.neighbour_across(t, p1, p2) else {
            return Ok(());
        };
        if self.mesh.is_tombstoned(tn) {
            return Ok(());
        }
        let d = self.mesh.third_vertex(tn, p1, p2);
        if in_circumcircle(self.mesh.point(d), a, b, self.mesh.point(p3)) {
            self.edge_swap(t, tn, p1, p3, p2, d)?;
        }
        Ok(())
    }

    /// Replace triangles `t1 = (a, b, c)` and `t2 = (a, c, d)` sharing edge
    /// `a`-`c` by the two triangles sharing `b`-`d`, then recurse on the two
    /// newly exposed outer edges.
    fn edge_swap(
        &mut self,
        t1: TriId,
        t2: TriId,
        a: PointId,
        b: PointId,
        c: PointId,
        d: PointId,
    ) -> Result<(), RefineError> {
        let nab = self.mesh.neighbour_across(t1, a, b);
        let nad = self.mesh.neighbour_across(t2, a, d);
        let tn1 = self.mesh.add_triangle(a, b, d, [nab, nad, None])?;
        let ncb = self.mesh.neighbour_across(t1, c, b);
        let ncd = self.mesh.neighbour_across(t2, c, d);
        let tn2 = self.mesh.add_triangle(c, b, d, [ncb, ncd, Some(tn1)])?;

        let anchor = self.mesh.anchor().tri;
        if t1 == anchor || t2 == anchor {
            self.mesh.update_anchor(&[tn1, tn2]);
        }

        let mut sources = [None, None];
        if self.mesh.has_bucket(t1) {
            sources[0] = Some(t1);
        }
        if self.mesh.has_bucket(t2) {
            sources[1] = Some(t2);
        }
        let sources: Vec<TriId> = sources.into_iter().flatten().collect();
        self.redistribute(&sources, &[tn1, tn2], None)?;

        self.mesh.tombstone(t1);
        self.mesh.tombstone(t2);
        self.stats.flips += 1;

        self.enforce_delaunay(tn1, a, d, b)?;
        self.enforce_delaunay(tn2, c, d, b)?;
        Ok(())
    }

    /// Move every sample of `sources` into the child triangle containing it,
    /// tracking each child's worst error. A sample coinciding with the
    /// promoted vertex is dropped, its elevation is now met exactly. Children
    /// whose worst error stays within tolerance settle; the rest are queued.
    fn redistribute(
        &mut self,
        sources: &[TriId],
        children: &[TriId],
        promoted: Option<Point>,
    ) -> Result<(), RefineError> {
        let child_points: Vec<[Point; 3]> = children
            .iter()
            .map(|&c| self.mesh.vertex_points(c))
            .collect();
        let mut buckets: Vec<Bucket> = children.iter().map(|_| Bucket::new()).collect();

        for &src in sources {
            let Some(bucket) = self.mesh.take_bucket(src) else {
                continue;
            };
            for sample in bucket.into_samples() {
                if promoted.is_some_and(|p| p.same_cell(&sample)) {
                    continue;
                }
                let mut placed = false;
                for (i, vs) in child_points.iter().enumerate() {
                    if in_triangle(vs[0], vs[1], vs[2], sample) {
                        buckets[i].push(sample, sample_error(sample, vs[0], vs[1], vs[2]));
                        placed = true;
                        break;
                    }
                }
                if !placed {
                    return Err(retin_mesh::MeshError::SampleOutsideTriangle { sample }.into());
                }
            }
        }

        for (&child, bucket) in children.iter().zip(buckets) {
            if bucket.worst_error() > self.epsilon {
                self.mesh.install_bucket(child, bucket);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use retin_mesh::TileBounds;

    use super::*;

    fn refiner(mesh: &mut TileMesh, epsilon: f64, delaunay: bool) -> Refiner<'_> {
        Refiner::new(mesh, epsilon, delaunay, -9999, false, 0)
    }

    /// Little-endian shard bytes for a tile, row-major.
    fn shard_bytes(nrows: i16, ncols: i16, f: impl Fn(i16, i16) -> i16) -> Vec<u8> {
        let mut bytes = Vec::new();
        for i in 0..nrows {
            for j in 0..ncols {
                bytes.extend_from_slice(&f(i, j).to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn test_seed_flat_tile_settles() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        let mut r = refiner(&mut mesh, 1.0, true);
        let bytes = shard_bytes(4, 4, |_, _| 100);
        r.seed(&mut bytes.as_slice()).unwrap();
        r.run().unwrap();
        assert_eq!(r.into_stats().promoted, 0);

        assert_eq!(mesh.num_triangles(), 2);
        assert!(mesh.heap_is_empty());
        assert_eq!(mesh.point(mesh.nw()).z, 100);
        assert_eq!(mesh.point(mesh.se()).z, 100);
        mesh.validate().unwrap();
    }

    #[test]
    fn test_seed_attaches_buckets() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        let mut r = refiner(&mut mesh, 1.0, true);
        let bytes = shard_bytes(4, 4, |i, j| if (i, j) == (1, 1) { 9 } else { 0 });
        r.seed(&mut bytes.as_slice()).unwrap();

        let first = mesh.anchor().tri;
        let second = mesh.neighbour_across(first, mesh.nw(), mesh.se()).unwrap();
        // Both triangles hold their samples; nothing is queued before the
        // replay step had its chance.
        assert!(mesh.has_bucket(first) && mesh.has_bucket(second));
        assert!(mesh.heap_is_empty());
        // The bump lies on the shared diagonal and belongs to the first
        // triangle.
        assert_eq!(mesh.worst_sample(first).unwrap(), (Point::new(1, 1, 9), 9.0));
        assert_eq!(mesh.worst_sample(second).unwrap().1, 0.0);
    }

    #[test]
    fn test_interior_bump_promotes_one_vertex() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 5, ncols: 5 });
        let mut r = refiner(&mut mesh, 3.0, false);
        // Plane at 10 with one off-diagonal bump of error 4; after its
        // promotion the residual errors stay at 2, within tolerance.
        let bytes = shard_bytes(5, 5, |i, j| if (i, j) == (3, 1) { 14 } else { 10 });
        r.seed(&mut bytes.as_slice()).unwrap();
        r.run().unwrap();
        let stats = r.into_stats();

        assert_eq!(stats.promoted, 1);
        assert_eq!(mesh.num_triangles(), 4);
        assert!(mesh.heap_is_empty());
        mesh.validate().unwrap();

        let has_bump = mesh
            .live_triangles()
            .flat_map(|t| mesh.vertex_points(t))
            .any(|p| p == Point::new(3, 1, 14));
        assert!(has_bump);
    }

    #[test]
    fn test_diagonal_bump_splits_both_triangles() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 5, ncols: 5 });
        let mut r = refiner(&mut mesh, 6.0, false);
        let bytes = shard_bytes(5, 5, |i, j| if (i, j) == (2, 2) { 20 } else { 10 });
        r.seed(&mut bytes.as_slice()).unwrap();
        r.run().unwrap();
        let stats = r.into_stats();

        // The bump sits on the shared diagonal: one promotion, both initial
        // triangles split in two.
        assert_eq!(stats.promoted, 1);
        assert_eq!(mesh.num_triangles(), 4);
        mesh.validate().unwrap();
    }

    #[test]
    fn test_boundary_bump_stays_tile_local() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 5, ncols: 5 });
        let mut r = refiner(&mut mesh, 5.0, false);
        let bytes = shard_bytes(5, 5, |i, j| if (i, j) == (2, 4) { 18 } else { 10 });
        r.seed(&mut bytes.as_slice()).unwrap();
        r.run().unwrap();
        let stats = r.into_stats();

        assert_eq!(stats.promoted, 1);
        // Collinear with the right boundary: only the owning triangle splits.
        assert_eq!(mesh.num_triangles(), 3);
        mesh.validate().unwrap();
        mesh.finalize();
        let strip = mesh.right_strip();
        assert_eq!(strip.inner(), &[Point::new(2, 4, 18)]);
    }

    #[test]
    fn test_flip_swaps_cocircular_diagonal() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        let first = mesh.anchor().tri;
        let (nw, ne, sw, se) = (mesh.nw(), mesh.ne(), mesh.sw(), mesh.se());

        // The four corners are cocircular, so the inclusive circumcircle test
        // flips the diagonal as soon as it is checked.
        let mut r = refiner(&mut mesh, 1.0, true);
        r.enforce_delaunay(first, nw, se, sw).unwrap();
        assert_eq!(r.into_stats().flips, 1);

        assert_eq!(mesh.num_triangles(), 2);
        assert!(mesh.is_tombstoned(first));
        mesh.validate().unwrap();
        for t in mesh.live_triangles() {
            let vs = mesh.vertices(t);
            assert!(vs.contains(&ne) && vs.contains(&sw), "diagonal was swapped");
        }
    }

    #[test]
    fn test_flip_rebuckets_samples() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        let first = mesh.anchor().tri;
        let (nw, sw, se) = (mesh.nw(), mesh.sw(), mesh.se());

        let mut bucket = Bucket::new();
        bucket.push(Point::new(2, 1, 9), 9.0);
        mesh.install_bucket(first, bucket);

        let mut r = refiner(&mut mesh, 1.0, true);
        r.enforce_delaunay(first, nw, se, sw).unwrap();

        // The sample moved into the replacement triangle that contains it.
        let owner = mesh
            .live_triangles()
            .find(|&t| mesh.has_bucket(t))
            .expect("sample is still bucketed");
        let vs = mesh.vertex_points(owner);
        assert!(in_triangle(vs[0], vs[1], vs[2], Point::new(2, 1, 9)));
        assert_eq!(mesh.heap_len(), 1);
    }

    #[test]
    fn test_replay_splits_left_boundary() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 2, nrows: 4, ncols: 4 });
        let mut r = refiner(&mut mesh, 1.0, true);
        let bytes = shard_bytes(4, 4, |_, _| 50);
        r.seed(&mut bytes.as_slice()).unwrap();

        // The left neighbour promoted (1, 2, 55) on the shared column.
        let strip = BoundaryStrip::new(vec![
            Point::new(0, 2, 50),
            Point::new(1, 2, 55),
            Point::new(3, 2, 50),
        ]);
        r.replay(Some(&strip), None).unwrap();
        r.run().unwrap();

        mesh.validate().unwrap();
        let replayed = mesh
            .live_triangles()
            .flat_map(|t| mesh.vertex_points(t))
            .any(|p| p == Point::new(1, 2, 55));
        assert!(replayed);
        // The replayed vertex splits a left-boundary triangle in place.
        assert!(mesh.num_triangles() > 2);
    }
}
