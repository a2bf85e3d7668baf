//! Streaming split of a raster into per-tile binary sample shards.
//!
//! Tiles overlap by one row and column so neighbouring tiles agree on their
//! shared boundary samples; a sample on a tile seam is written into every
//! tile whose window contains it (up to four at a corner). Shards are
//! anonymous temporary files of fixed-width little-endian elevations in the
//! tile's own row-major order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use retin_geometry::{Coord, Elev};
use tracing::{debug, info};

use crate::ascii::{check_sample, parse_header, GridHeader, SampleTokens};
use crate::GridError;

/// Number of tiles of side `tile_len` needed to cover `n` samples with a one
/// sample overlap. Never produces a trailing tile narrower than two samples.
pub fn tiles_along(n: Coord, tile_len: usize) -> usize {
    let n = n as usize;
    debug_assert!(n >= 2 && tile_len >= 2);
    if tile_len >= n {
        1
    } else {
        (n - 2) / (tile_len - 1) + 1
    }
}

/// A raster split into per-tile sample shards, ready for refinement.
#[derive(Debug)]
pub struct TiledGrid {
    header: GridHeader,
    tile_len: usize,
    i_tiles: usize,
    j_tiles: usize,
    shards: Vec<File>,
    min: Elev,
    max: Elev,
}

impl TiledGrid {
    /// Stream the raster at `path` once, writing every sample into the shard
    /// of each tile whose window contains it and recording the non-nodata
    /// elevation range.
    pub fn build(path: &Path, tile_len: usize) -> Result<Self, GridError> {
        let file = File::open(path).map_err(|err| GridError::io(path, err))?;
        let mut reader = BufReader::new(file);
        let header = parse_header(&mut reader).map_err(GridError::InvalidRaster)?;

        let tile_len = tile_len.max(2);
        let i_tiles = tiles_along(header.nrows, tile_len);
        let j_tiles = tiles_along(header.ncols, tile_len);
        info!(
            nrows = header.nrows,
            ncols = header.ncols,
            tile_len,
            i_tiles,
            j_tiles,
            "splitting raster into tile shards"
        );

        let mut shards = Vec::with_capacity(i_tiles * j_tiles);
        for _ in 0..i_tiles * j_tiles {
            let shard = tempfile::tempfile().map_err(|err| GridError::io(path, err))?;
            shards.push(BufWriter::new(shard));
        }

        let span = |index: Coord, tiles: usize| {
            let q = index as usize / (tile_len - 1);
            let r = index as usize % (tile_len - 1);
            let hi = q.min(tiles - 1);
            let lo = if r == 0 && q > 0 { (q - 1).min(tiles - 1) } else { hi };
            lo..=hi
        };

        let mut min = Elev::MAX;
        let mut max = Elev::MIN;
        let mut nodata_cells = 0u64;
        let mut tokens = SampleTokens::new(reader);
        for i in 0..header.nrows {
            for j in 0..header.ncols {
                let value = tokens.next_value().map_err(GridError::InvalidRaster)?;
                let z = check_sample(value).map_err(GridError::InvalidRaster)?;
                if z == header.nodata {
                    nodata_cells += 1;
                } else {
                    min = min.min(z);
                    max = max.max(z);
                }
                for ti in span(i, i_tiles) {
                    for tj in span(j, j_tiles) {
                        shards[ti * j_tiles + tj]
                            .write_i16::<LittleEndian>(z)
                            .map_err(|err| GridError::io(path, err))?;
                    }
                }
            }
        }

        if min > max {
            return Err(GridError::InvalidRaster(String::from(
                "raster contains no data samples",
            )));
        }
        if nodata_cells > 0 {
            debug!(nodata_cells, "raster contains nodata samples");
        }

        let mut files = Vec::with_capacity(shards.len());
        for shard in shards {
            let file = shard
                .into_inner()
                .map_err(|err| GridError::io(path, err.into_error()))?;
            files.push(file);
        }

        Ok(Self {
            header,
            tile_len,
            i_tiles,
            j_tiles,
            shards: files,
            min,
            max,
        })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn tile_len(&self) -> usize {
        self.tile_len
    }

    pub fn i_tiles(&self) -> usize {
        self.i_tiles
    }

    pub fn j_tiles(&self) -> usize {
        self.j_tiles
    }

    pub fn num_tiles(&self) -> usize {
        self.i_tiles * self.j_tiles
    }

    /// Smallest non-nodata elevation.
    pub fn min(&self) -> Elev {
        self.min
    }

    /// Largest non-nodata elevation.
    pub fn max(&self) -> Elev {
        self.max
    }

    pub fn row_offset(&self, ti: usize) -> Coord {
        (ti * (self.tile_len - 1)) as Coord
    }

    pub fn col_offset(&self, tj: usize) -> Coord {
        (tj * (self.tile_len - 1)) as Coord
    }

    pub fn tile_rows(&self, ti: usize) -> Coord {
        if ti + 1 == self.i_tiles {
            self.header.nrows - self.row_offset(ti)
        } else {
            self.tile_len as Coord
        }
    }

    pub fn tile_cols(&self, tj: usize) -> Coord {
        if tj + 1 == self.j_tiles {
            self.header.ncols - self.col_offset(tj)
        } else {
            self.tile_len as Coord
        }
    }

    /// A fresh reader over one tile's samples, positioned at the start.
    pub fn shard_reader(&self, ti: usize, tj: usize) -> std::io::Result<impl Read> {
        let mut file = self.shards[ti * self.j_tiles + tj].try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use byteorder::ReadBytesExt;

    use super::*;
    use crate::ascii::{write_grid, Grid};

    fn write_test_grid(nrows: Coord, ncols: Coord, f: impl Fn(Coord, Coord) -> Elev) -> (tempfile::TempDir, std::path::PathBuf) {
        let header = GridHeader {
            ncols,
            nrows,
            xllcorner: 0.0,
            yllcorner: 0.0,
            cellsize: 1.0,
            nodata: -9999,
        };
        let mut data = Vec::new();
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j));
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.asc");
        write_grid(&Grid::new(header, data), &path).unwrap();
        (dir, path)
    }

    fn read_shard(grid: &TiledGrid, ti: usize, tj: usize) -> Vec<Elev> {
        let mut reader = grid.shard_reader(ti, tj).unwrap();
        let mut values = Vec::new();
        while let Ok(v) = reader.read_i16::<LittleEndian>() {
            values.push(v);
        }
        values
    }

    #[test]
    fn test_tiles_along() {
        assert_eq!(tiles_along(4, 100), 1);
        assert_eq!(tiles_along(4, 4), 1);
        assert_eq!(tiles_along(5, 3), 2);
        assert_eq!(tiles_along(6, 3), 3);
        assert_eq!(tiles_along(7, 4), 2);
        // An exact overlap fit never yields a degenerate one-sample tile.
        assert_eq!(tiles_along(5, 5), 1);
        assert_eq!(tiles_along(9, 5), 2);
    }

    #[test]
    fn test_single_tile_shard() {
        let (_dir, path) = write_test_grid(2, 3, |i, j| (10 * i + j) as Elev);
        let grid = TiledGrid::build(&path, 100).unwrap();
        assert_eq!(grid.num_tiles(), 1);
        assert_eq!(grid.min(), 0);
        assert_eq!(grid.max(), 12);
        assert_eq!(read_shard(&grid, 0, 0), vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_two_tiles_share_boundary_column() {
        // 3 rows x 5 cols, tile side 3: tiles cover columns 0..=2 and 2..=4.
        let (_dir, path) = write_test_grid(3, 5, |i, j| (10 * i + j) as Elev);
        let grid = TiledGrid::build(&path, 3).unwrap();
        assert_eq!((grid.i_tiles(), grid.j_tiles()), (1, 2));
        assert_eq!(grid.col_offset(1), 2);
        assert_eq!(grid.tile_cols(0), 3);
        assert_eq!(grid.tile_cols(1), 3);

        assert_eq!(
            read_shard(&grid, 0, 0),
            vec![0, 1, 2, 10, 11, 12, 20, 21, 22]
        );
        assert_eq!(
            read_shard(&grid, 0, 1),
            vec![2, 3, 4, 12, 13, 14, 22, 23, 24]
        );
    }

    #[test]
    fn test_four_tiles_share_corner() {
        // 5x5 with tile side 3: the centre sample lands in all four shards.
        let (_dir, path) = write_test_grid(5, 5, |i, j| (10 * i + j) as Elev);
        let grid = TiledGrid::build(&path, 3).unwrap();
        assert_eq!((grid.i_tiles(), grid.j_tiles()), (2, 2));
        for (ti, tj) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            let shard = read_shard(&grid, ti, tj);
            assert_eq!(shard.len(), 9);
            assert!(shard.contains(&22), "tile ({ti},{tj}) misses the centre");
        }
        assert_eq!(read_shard(&grid, 1, 1), vec![22, 23, 24, 32, 33, 34, 42, 43, 44]);
    }

    #[test]
    fn test_tile_geometry() {
        let (_dir, path) = write_test_grid(6, 5, |_, _| 1);
        let grid = TiledGrid::build(&path, 3).unwrap();
        assert_eq!((grid.i_tiles(), grid.j_tiles()), (3, 2));

        assert_eq!(grid.row_offset(0), 0);
        assert_eq!(grid.row_offset(1), 2);
        assert_eq!(grid.row_offset(2), 4);
        assert_eq!(grid.tile_rows(0), 3);
        assert_eq!(grid.tile_rows(1), 3);
        // The last band only covers the remaining rows.
        assert_eq!(grid.tile_rows(2), 2);

        assert_eq!(grid.col_offset(1), 2);
        assert_eq!(grid.tile_cols(1), 3);
    }

    #[test]
    fn test_min_max_exclude_nodata() {
        let (_dir, path) = write_test_grid(2, 2, |i, j| if i == 0 && j == 0 { -9999 } else { 5 });
        let grid = TiledGrid::build(&path, 100).unwrap();
        assert_eq!(grid.min(), 5);
        assert_eq!(grid.max(), 5);
    }

    #[test]
    fn test_all_nodata_rejected() {
        let (_dir, path) = write_test_grid(2, 2, |_, _| -9999);
        assert!(matches!(
            TiledGrid::build(&path, 100),
            Err(GridError::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_shard_reader_rewinds() {
        let (_dir, path) = write_test_grid(2, 2, |i, j| (i + j) as Elev);
        let grid = TiledGrid::build(&path, 100).unwrap();
        assert_eq!(read_shard(&grid, 0, 0), vec![0, 1, 1, 2]);
        // A second reader starts from the beginning again.
        assert_eq!(read_shard(&grid, 0, 0), vec![0, 1, 1, 2]);
    }
}
