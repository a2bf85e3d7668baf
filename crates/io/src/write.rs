//! Tile serialization by traversal.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use retin_geometry::Point;
use retin_mesh::{BoundaryStrip, TileMesh};

use crate::{TinFileError, TILE_MARKER_Z, TRI_MARKER_OFFSET};

/// Counts reported back to the orchestrator for the global header totals.
#[derive(Clone, Copy, Debug)]
pub struct TileStats {
    pub triangles: u32,
    pub points: u32,
}

/// Maps a vertex to its index in the tile's combined vertex numbering:
/// interior, right boundary, bottom boundary (whose trailing shared corner
/// slot is reclaimed), then the inner points of the left neighbour's right
/// strip and the top neighbour's bottom strip.
struct VertexIndex<'a> {
    interior: &'a [Point],
    right: &'a [Point],
    bottom: &'a [Point],
    left_inner: &'a [Point],
    top_inner: &'a [Point],
}

impl VertexIndex<'_> {
    fn num_points(&self) -> u32 {
        (self.interior.len() + self.right.len() + self.bottom.len() - 1
            + self.left_inner.len()
            + self.top_inner.len()) as u32
    }

    fn lookup(&self, p: Point) -> Option<u32> {
        let find = |slice: &[Point]| {
            slice
                .binary_search_by(|q| q.position().cmp(&p.position()))
                .ok()
        };

        let interior_len = self.interior.len();
        let right_len = self.right.len();
        let bottom_len = self.bottom.len();
        if let Some(i) = find(self.interior) {
            return Some(i as u32);
        }
        if let Some(i) = find(self.right) {
            return Some((interior_len + i) as u32);
        }
        // The bottom array's last entry is the se corner, already indexed via
        // the right array; its slot is handed to the left strip below.
        if let Some(i) = find(&self.bottom[..bottom_len - 1]) {
            return Some((interior_len + right_len + i) as u32);
        }
        let base = interior_len + right_len + bottom_len - 1;
        if let Some(i) = find(self.left_inner) {
            return Some((base + i) as u32);
        }
        if let Some(i) = find(self.top_inner) {
            return Some((base + self.left_inner.len() + i) as u32);
        }
        None
    }
}

fn write_vertex<W: Write>(w: &mut W, p: Point, index: u32) -> std::io::Result<()> {
    w.write_i16::<LittleEndian>(p.x)?;
    w.write_i16::<LittleEndian>(p.y)?;
    w.write_i16::<LittleEndian>(p.z)?;
    w.write_u32::<LittleEndian>(index)?;
    Ok(())
}

/// Serialize one refined tile: marker, tile header, then one record per
/// traversal visit. `left` and `top` are the strips this tile consumed
/// during replay, still needed here to index the replayed vertices.
///
/// The mesh must be finalized (vertex arrays sorted).
pub fn write_tile<W: Write>(
    w: &mut W,
    mesh: &TileMesh,
    left: Option<&BoundaryStrip>,
    top: Option<&BoundaryStrip>,
) -> Result<TileStats, TinFileError> {
    let interior = mesh.interior_points();
    let right = mesh.right_points();
    let bottom = mesh.bottom_points();
    let index = VertexIndex {
        interior: &interior,
        right: &right,
        bottom: &bottom,
        left_inner: left.map_or(&[][..], BoundaryStrip::inner),
        top_inner: top.map_or(&[][..], BoundaryStrip::inner),
    };

    let num_triangles = mesh.num_triangles();
    let num_points = index.num_points();
    let bounds = mesh.bounds();

    for _ in 0..3 {
        write_vertex(w, Point::new(0, 0, TILE_MARKER_Z), 0)?;
    }
    w.write_u32::<LittleEndian>(num_triangles + TRI_MARKER_OFFSET)?;

    w.write_i16::<LittleEndian>(bounds.i_offset)?;
    w.write_i16::<LittleEndian>(bounds.j_offset)?;
    w.write_i16::<LittleEndian>(bounds.nrows)?;
    w.write_i16::<LittleEndian>(bounds.ncols)?;
    w.write_u32::<LittleEndian>(num_triangles)?;
    w.write_u32::<LittleEndian>(num_points)?;

    let mut assigned: Vec<Option<u32>> = vec![None; mesh.slot_count()];
    let mut next_index = 0u32;
    let mut visit_count = 0u64;
    for t in mesh.visits() {
        let tri_index = match assigned[t.index()] {
            Some(i) => i,
            None => {
                let i = next_index;
                next_index += 1;
                assigned[t.index()] = Some(i);
                i
            }
        };
        for p in mesh.vertex_points(t) {
            let vertex_index = index.lookup(p).ok_or(TinFileError::UnindexedVertex(p))?;
            write_vertex(w, p, vertex_index)?;
        }
        w.write_u32::<LittleEndian>(tri_index)?;
        visit_count += 1;
    }

    if next_index != num_triangles || visit_count != 3 * u64::from(num_triangles) {
        return Err(TinFileError::Format(format!(
            "traversal covered {next_index} of {num_triangles} triangles in {visit_count} visits"
        )));
    }

    Ok(TileStats {
        triangles: num_triangles,
        points: num_points,
    })
}
