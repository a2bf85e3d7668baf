//! Edge walk over a tile's triangulation.
//!
//! Starting from the lower-left anchor edge, the walk crosses every edge of
//! the tile from both sides plus once "back", which lands on every triangle
//! exactly three times. The serializer relies on the visit order: consecutive
//! visits always share an edge, so a reader can re-link triangles from the
//! record stream alone.
//!
//! Each of a triangle's edges is classified against the lower-left vertex
//! `v`: an edge whose far side holds `v` is IN (crossing it moves towards
//! `v`), otherwise it is OUT. When two edges share a class the tie is broken
//! into the secondary INBACK/OUTBACK roles, with collinear sub-cases for
//! degenerate sightlines and for the anchor triangle itself, where `v` is one
//! of the triangle's own vertices.

use retin_geometry::Point;

use crate::store::{PointId, TriId};
use crate::tile::TileMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeClass {
    In,
    InBack,
    Out,
    OutBack,
}

#[derive(Clone, Copy)]
struct LocalEdge {
    a: PointId,
    b: PointId,
    /// Triangle on the other side; the triangle itself when the edge has no
    /// crossable other side (tile boundary or hull).
    across: TriId,
    class: EdgeClass,
}

impl LocalEdge {
    fn matches(&self, edge: (PointId, PointId)) -> bool {
        (self.a == edge.0 && self.b == edge.1) || (self.a == edge.1 && self.b == edge.0)
    }
}

fn area(a: Point, b: Point, c: Point) -> i8 {
    retin_geometry::signed_area(a, b, c).sign()
}

/// Resolve a two-IN tie between the edges `ea = (s, a)` and `eb = (s, b)`
/// sharing vertex `s`; `ec` is the remaining edge.
fn fix_two_in(
    edges: &mut [LocalEdge; 3],
    ea: usize,
    eb: usize,
    ec: usize,
    s: Point,
    a: Point,
    b: Point,
    v: Point,
) {
    let av = area(v, s, a);
    let ao = area(v, s, b);
    if av > 0 && ao < 0 {
        edges[eb].class = EdgeClass::InBack;
    } else if av < 0 && ao > 0 {
        edges[ea].class = EdgeClass::InBack;
    } else if av < 0 && ao == 0 {
        edges[eb].class = EdgeClass::Out;
        edges[ec].class = EdgeClass::OutBack;
    } else if av > 0 && ao == 0 {
        edges[eb].class = EdgeClass::InBack;
    } else if av == 0 && ao < 0 {
        edges[ea].class = EdgeClass::Out;
        edges[ec].class = EdgeClass::OutBack;
    } else if av == 0 && ao > 0 {
        edges[ea].class = EdgeClass::InBack;
    } else {
        // Both sightlines collinear: v is a vertex of this triangle and this
        // is the anchor triangle. The leftmost of the two edges stays IN.
        debug_assert!(av == 0 && ao == 0);
        let lead = area(s, a, b);
        debug_assert!(lead != 0);
        if lead > 0 {
            edges[eb].class = EdgeClass::Out;
        } else {
            edges[ea].class = EdgeClass::Out;
        }
        edges[ec].class = EdgeClass::OutBack;
    }
}

/// Resolve a two-OUT tie between `ea = (s, a)` and `eb = (s, b)`; the
/// leftmost one stays OUT.
fn fix_two_out(edges: &mut [LocalEdge; 3], ea: usize, eb: usize, s: Point, a: Point, v: Point) {
    if area(v, s, a) >= 0 {
        edges[eb].class = EdgeClass::OutBack;
    } else {
        edges[ea].class = EdgeClass::OutBack;
    }
}

/// Classify the edges of `t` and step the walk: returns the next triangle
/// and the next current edge.
fn next_edge(mesh: &TileMesh, t: TriId, cur: (PointId, PointId)) -> (TriId, (PointId, PointId)) {
    let vs = mesh.vertices(t);
    let pts = [mesh.point(vs[0]), mesh.point(vs[1]), mesh.point(vs[2])];
    let v = mesh.point(mesh.anchor().vertex);

    // Edge i pairs (vertex, vertex, apex): (0,1,2), (0,2,1), (1,2,0).
    let defs = [(0usize, 1usize, 2usize), (0, 2, 1), (1, 2, 0)];
    let mut edges = defs.map(|(i, j, k)| {
        let (a, b) = (vs[i], vs[j]);
        let across = mesh.neighbour_across(t, a, b).unwrap_or(t);
        let area_op = area(pts[i], pts[j], pts[k]);
        let area_v = area(pts[i], pts[j], v);
        let class = if (area_op > 0 && area_v <= 0) || (area_op < 0 && area_v >= 0) {
            EdgeClass::In
        } else {
            EdgeClass::Out
        };
        LocalEdge { a, b, across, class }
    });

    // Tie fixups. Each pair shares one vertex; the first-listed edge plays
    // the `(s, a)` role.
    if edges[0].class == EdgeClass::In && edges[1].class == EdgeClass::In {
        fix_two_in(&mut edges, 0, 1, 2, pts[0], pts[1], pts[2], v);
    }
    if edges[0].class == EdgeClass::In && edges[2].class == EdgeClass::In {
        fix_two_in(&mut edges, 0, 2, 1, pts[1], pts[0], pts[2], v);
    }
    if edges[1].class == EdgeClass::In && edges[2].class == EdgeClass::In {
        fix_two_in(&mut edges, 1, 2, 0, pts[2], pts[0], pts[1], v);
    }
    if edges[0].class == EdgeClass::Out && edges[1].class == EdgeClass::Out {
        fix_two_out(&mut edges, 0, 1, pts[0], pts[1], v);
    }
    if edges[0].class == EdgeClass::Out && edges[2].class == EdgeClass::Out {
        fix_two_out(&mut edges, 0, 2, pts[1], pts[0], v);
    }
    if edges[1].class == EdgeClass::Out && edges[2].class == EdgeClass::Out {
        fix_two_out(&mut edges, 1, 2, pts[2], pts[0], v);
    }

    let out_back = edges.iter().any(|e| e.class == EdgeClass::OutBack);
    let find = |class: EdgeClass| {
        edges
            .iter()
            .find(|e| e.class == class)
            .copied()
            .expect("edge classification lost a role")
    };
    let incoming = edges
        .iter()
        .find(|e| e.matches(cur))
        .expect("current edge does not belong to the triangle");

    match incoming.class {
        EdgeClass::In => {
            let out = find(EdgeClass::Out);
            (out.across, (out.a, out.b))
        }
        EdgeClass::InBack => (incoming.across, cur),
        EdgeClass::Out if out_back => {
            let back = find(EdgeClass::OutBack);
            (back.across, (back.a, back.b))
        }
        _ => {
            let inward = find(EdgeClass::In);
            (inward.across, (inward.a, inward.b))
        }
    }
}

/// Iterator over traversal visits; yields each live triangle exactly three
/// times.
pub struct Visits<'a> {
    mesh: &'a TileMesh,
    cur: TriId,
    prev: TriId,
    edge: (PointId, PointId),
    start: (PointId, PointId),
    done: bool,
}

impl<'a> Visits<'a> {
    fn new(mesh: &'a TileMesh) -> Self {
        let anchor = mesh.anchor();
        Self {
            mesh,
            cur: anchor.tri,
            prev: anchor.tri,
            edge: anchor.edge,
            start: anchor.edge,
            done: false,
        }
    }
}

impl Iterator for Visits<'_> {
    type Item = TriId;

    fn next(&mut self) -> Option<TriId> {
        if self.done {
            return None;
        }
        let visit = self.prev;
        self.prev = self.cur;
        let (next, edge) = next_edge(self.mesh, self.cur, self.edge);
        self.cur = next;
        self.edge = edge;
        if (edge.0 == self.start.0 && edge.1 == self.start.1)
            || (edge.0 == self.start.1 && edge.1 == self.start.0)
        {
            self.done = true;
        }
        Some(visit)
    }
}

impl TileMesh {
    /// Walk the tile from the lower-left anchor edge. See the module
    /// documentation for the visit guarantees.
    pub fn visits(&self) -> Visits<'_> {
        Visits::new(self)
    }
}
