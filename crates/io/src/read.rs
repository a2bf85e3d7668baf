//! Reading a finished TIN file back into indexed per-tile meshes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use retin_geometry::{Coord, Point};

use crate::{TinFileError, TinHeader, TILE_MARKER_Z, TRI_MARKER_OFFSET};

/// A triangle restored from the file: vertex slots into the tile's point
/// table and neighbour slots into its triangle table, both using the edge
/// order `(v0, v1)`, `(v0, v2)`, `(v1, v2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedTriangle {
    pub vertices: [u32; 3],
    pub neighbours: [Option<u32>; 3],
}

impl LoadedTriangle {
    fn edge_index(&self, a: u32, b: u32) -> Option<usize> {
        let [v0, v1, v2] = self.vertices;
        if (v0 == a || v1 == a) && (v0 == b || v1 == b) && a != b {
            Some(0)
        } else if (v0 == a || v2 == a) && (v0 == b || v2 == b) && a != b {
            Some(1)
        } else if (v1 == a || v2 == a) && (v1 == b || v2 == b) && a != b {
            Some(2)
        } else {
            None
        }
    }

    fn contains(&self, v: u32) -> bool {
        self.vertices.contains(&v)
    }
}

/// One tile of a loaded TIN.
#[derive(Clone, Debug)]
pub struct LoadedTile {
    pub i_offset: Coord,
    pub j_offset: Coord,
    pub nrows: Coord,
    pub ncols: Coord,
    pub num_points: u32,
    points: Vec<Option<Point>>,
    pub triangles: Vec<LoadedTriangle>,
}

impl LoadedTile {
    /// The point behind a vertex slot. Slots that no record referenced (the
    /// bottom array's shared-corner slot) are empty.
    pub fn point(&self, index: u32) -> Option<Point> {
        self.points.get(index as usize).copied().flatten()
    }

    pub fn triangle_points(&self, t: &LoadedTriangle) -> [Point; 3] {
        t.vertices
            .map(|v| self.point(v).expect("referenced vertex slot is filled"))
    }
}

/// An entire loaded TIN.
#[derive(Clone, Debug)]
pub struct Tin {
    pub header: TinHeader,
    pub tiles: Vec<LoadedTile>,
}

struct VertexRecord {
    point: Point,
    index: u32,
}

fn read_vertex<R: Read>(r: &mut R) -> std::io::Result<VertexRecord> {
    let x = r.read_i16::<LittleEndian>()?;
    let y = r.read_i16::<LittleEndian>()?;
    let z = r.read_i16::<LittleEndian>()?;
    let index = r.read_u32::<LittleEndian>()?;
    Ok(VertexRecord {
        point: Point::new(x, y, z),
        index,
    })
}

/// Consume the three pseudo-point records announcing a tile and return the
/// sentinel triangle count that follows them.
fn read_marker<R: Read>(r: &mut R) -> Result<u32, TinFileError> {
    for _ in 0..3 {
        let record = read_vertex(r)?;
        if record.point != Point::new(0, 0, TILE_MARKER_Z) || record.index != 0 {
            return Err(TinFileError::Format(String::from(
                "tile marker records are corrupt",
            )));
        }
    }
    Ok(r.read_u32::<LittleEndian>()?)
}

fn read_tile<R: Read>(r: &mut R) -> Result<LoadedTile, TinFileError> {
    let sentinel = read_marker(r)?;

    let i_offset = r.read_i16::<LittleEndian>()?;
    let j_offset = r.read_i16::<LittleEndian>()?;
    let nrows = r.read_i16::<LittleEndian>()?;
    let ncols = r.read_i16::<LittleEndian>()?;
    let num_triangles = r.read_u32::<LittleEndian>()?;
    let num_points = r.read_u32::<LittleEndian>()?;

    if sentinel != num_triangles + TRI_MARKER_OFFSET {
        return Err(TinFileError::Format(format!(
            "tile sentinel {sentinel} does not match triangle count {num_triangles}"
        )));
    }

    let mut points: Vec<Option<Point>> = vec![None; num_points as usize];
    let mut triangles: Vec<Option<LoadedTriangle>> = vec![None; num_triangles as usize];
    let mut prev: Option<u32> = None;

    for _ in 0..3 * u64::from(num_triangles) {
        let v1 = read_vertex(r)?;
        let v2 = read_vertex(r)?;
        let v3 = read_vertex(r)?;
        let tri_index = r.read_u32::<LittleEndian>()?;

        if tri_index >= num_triangles {
            return Err(TinFileError::Format(format!(
                "triangle index {tri_index} out of range"
            )));
        }
        let mut vertices = [0u32; 3];
        for (slot, record) in vertices.iter_mut().zip([&v1, &v2, &v3]) {
            if record.index >= num_points {
                return Err(TinFileError::Format(format!(
                    "vertex index {} out of range",
                    record.index
                )));
            }
            match points[record.index as usize] {
                Some(existing) if existing != record.point => {
                    return Err(TinFileError::Format(format!(
                        "vertex slot {} bound to both {existing:?} and {:?}",
                        record.index, record.point
                    )));
                }
                Some(_) => {}
                None => points[record.index as usize] = Some(record.point),
            }
            *slot = record.index;
        }

        match &triangles[tri_index as usize] {
            Some(existing) if existing.vertices != vertices => {
                return Err(TinFileError::Format(format!(
                    "triangle {tri_index} revisited with different vertices"
                )));
            }
            Some(_) => {}
            None => {
                triangles[tri_index as usize] = Some(LoadedTriangle {
                    vertices,
                    neighbours: [None; 3],
                });
            }
        }

        // Consecutive visits share the edge the traversal crossed; restore
        // the symmetric neighbour links from that adjacency.
        if let Some(prev_index) = prev {
            if prev_index != tri_index {
                let prev_tri = triangles[prev_index as usize]
                    .as_ref()
                    .copied()
                    .expect("previous triangle was recorded");
                let cur = triangles[tri_index as usize].as_mut().expect("just recorded");
                let shared = [(0usize, 1usize), (0, 2), (1, 2)].into_iter().find(|&(a, b)| {
                    prev_tri.contains(cur.vertices[a]) && prev_tri.contains(cur.vertices[b])
                });
                let Some((a, b)) = shared else {
                    return Err(TinFileError::Format(format!(
                        "triangles {prev_index} and {tri_index} are consecutive but share no edge"
                    )));
                };
                let (pa, pb) = (cur.vertices[a], cur.vertices[b]);
                let cur_edge = cur
                    .edge_index(pa, pb)
                    .expect("shared edge belongs to the current triangle");
                cur.neighbours[cur_edge] = Some(prev_index);
                let prev_mut = triangles[prev_index as usize].as_mut().expect("recorded");
                match prev_mut.edge_index(pa, pb) {
                    Some(i) => prev_mut.neighbours[i] = Some(tri_index),
                    None => {
                        return Err(TinFileError::Format(format!(
                            "shared edge missing from triangle {prev_index}"
                        )));
                    }
                }
            }
        }
        prev = Some(tri_index);
    }

    let triangles = triangles
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            t.ok_or_else(|| TinFileError::Format(format!("triangle {i} never appeared")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadedTile {
        i_offset,
        j_offset,
        nrows,
        ncols,
        num_points,
        points,
        triangles,
    })
}

/// Load a complete TIN file.
pub fn read_tin(path: &Path) -> Result<Tin, TinFileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let header = TinHeader::read_from(&mut reader)?;

    let mut tiles = Vec::with_capacity(header.num_tiles as usize);
    for _ in 0..header.num_tiles {
        tiles.push(read_tile(&mut reader)?);
    }
    Ok(Tin { header, tiles })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use retin_mesh::{TileBounds, TileMesh};

    use super::*;
    use crate::write::write_tile;

    fn write_full_file(meshes: &[&TileMesh], header: &mut TinHeader) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut total_tris = 0;
        let mut total_points = 0;
        let mut body = Vec::new();
        for mesh in meshes {
            let stats = write_tile(&mut body, mesh, None, None).unwrap();
            total_tris += stats.triangles;
            total_points += stats.points;
        }
        header.num_tiles = meshes.len() as u32;
        header.num_triangles = total_tris;
        header.num_points = total_points;
        header.write_to(&mut buf).unwrap();
        buf.extend_from_slice(&body);
        buf
    }

    fn blank_header() -> TinHeader {
        TinHeader {
            ncols: 4,
            nrows: 4,
            xllcorner: 0.0,
            yllcorner: 0.0,
            cellsize: 1.0,
            num_tiles: 0,
            num_triangles: 0,
            num_points: 0,
            tile_len: 4,
            min: 0,
            max: 10,
            nodata: -9999,
        }
    }

    #[test]
    fn test_roundtrip_initial_tile() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        mesh.finalize();
        let bytes = write_full_file(&[&mesh], &mut blank_header());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.tin");
        std::fs::write(&path, &bytes).unwrap();
        let tin = read_tin(&path).unwrap();

        assert_eq!(tin.header.num_tiles, 1);
        assert_eq!(tin.tiles.len(), 1);
        let tile = &tin.tiles[0];
        assert_eq!(tile.num_points, 4);
        assert_eq!(tile.triangles.len(), 2);

        // The two triangles are linked across their shared diagonal.
        let [a, b] = [&tile.triangles[0], &tile.triangles[1]];
        assert!(a.neighbours.contains(&Some(1)));
        assert!(b.neighbours.contains(&Some(0)));

        let loaded: BTreeSet<Vec<Point>> = tile
            .triangles
            .iter()
            .map(|t| {
                let mut ps = tile.triangle_points(t).to_vec();
                ps.sort();
                ps
            })
            .collect();
        let expected: BTreeSet<Vec<Point>> = mesh
            .live_triangles()
            .map(|t| {
                let mut ps = mesh.vertex_points(t).to_vec();
                ps.sort();
                ps
            })
            .collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_rejects_bad_marker() {
        let mut mesh = TileMesh::new(TileBounds { i_offset: 0, j_offset: 0, nrows: 4, ncols: 4 });
        mesh.finalize();
        let mut bytes = write_full_file(&[&mesh], &mut blank_header());
        // Corrupt the marker z of the first pseudo point (header is 50 bytes,
        // the z field sits 4 bytes into the record).
        bytes[50 + 4] = 0;
        bytes[50 + 5] = 0;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.tin");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_tin(&path), Err(TinFileError::Format(_))));
    }
}
