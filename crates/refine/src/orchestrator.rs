//! Streams a tiled raster through per-tile refinement.
//!
//! Tiles are processed row-major. Each tile consumes the boundary strips its
//! top and left neighbours produced, is refined to tolerance, written to the
//! output file, and dropped; only the strips survive until the right and
//! bottom neighbours have replayed them.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use retin_grid::TiledGrid;
use retin_io::{write_tile, TinFileError, TinHeader};
use retin_mesh::{tile_len_for_memory, BoundaryStrip, TileBounds, TileMesh};

use crate::refiner::Refiner;
use crate::{RefineError, RefineParams};

/// Outcome of a whole-raster refinement.
#[derive(Clone, Copy, Debug)]
pub struct RefineSummary {
    pub tiles: u32,
    pub triangles: u64,
    pub points: u64,
    pub raster_cells: u64,
    pub epsilon_absolute: f64,
    pub elapsed: Duration,
}

/// Refine the raster at `input` into a TIN file at `output`.
///
/// The tile side is derived from the memory budget; the absolute error
/// tolerance is `epsilon_percent` of the raster's elevation range.
pub fn refine_raster(
    input: &Path,
    output: &Path,
    params: &RefineParams,
) -> Result<RefineSummary, RefineError> {
    refine_with_tile_len(input, output, params, tile_len_for_memory(params.memory_limit_mb))
}

fn tin_file_error(path: &Path, source: TinFileError) -> RefineError {
    RefineError::TinFile {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn refine_with_tile_len(
    input: &Path,
    output: &Path,
    params: &RefineParams,
    tile_len: usize,
) -> Result<RefineSummary, RefineError> {
    let started = Instant::now();
    let grid = TiledGrid::build(input, tile_len)?;
    let h = *grid.header();
    let epsilon =
        (f64::from(grid.max()) - f64::from(grid.min())) * params.epsilon_percent / 100.0;
    info!(
        nrows = h.nrows,
        ncols = h.ncols,
        tiles = grid.num_tiles(),
        epsilon_percent = params.epsilon_percent,
        epsilon_absolute = epsilon,
        delaunay = params.delaunay,
        use_nodata = params.use_nodata,
        "starting refinement"
    );

    let mut header = TinHeader {
        ncols: h.ncols,
        nrows: h.nrows,
        xllcorner: h.xllcorner,
        yllcorner: h.yllcorner,
        cellsize: h.cellsize,
        num_tiles: grid.num_tiles() as u32,
        num_triangles: 0,
        num_points: 0,
        tile_len: grid.tile_len() as u32,
        min: grid.min(),
        max: grid.max(),
        nodata: h.nodata,
    };

    let file = File::create(output).map_err(|err| tin_file_error(output, err.into()))?;
    let mut writer = BufWriter::new(file);
    header
        .write_to(&mut writer)
        .map_err(|err| tin_file_error(output, err.into()))?;

    let mut top_strips: Vec<Option<BoundaryStrip>> = (0..grid.j_tiles()).map(|_| None).collect();
    let mut total_triangles = 0u64;
    let mut total_points = 0u64;

    for ti in 0..grid.i_tiles() {
        let mut left_strip: Option<BoundaryStrip> = None;
        for tj in 0..grid.j_tiles() {
            let bounds = TileBounds {
                i_offset: grid.row_offset(ti),
                j_offset: grid.col_offset(tj),
                nrows: grid.tile_rows(ti),
                ncols: grid.tile_cols(tj),
            };
            let mut mesh = TileMesh::new(bounds);

            let mut refiner = Refiner::new(
                &mut mesh,
                epsilon,
                params.delaunay,
                h.nodata,
                params.use_nodata,
                grid.min(),
            );
            let mut shard = grid
                .shard_reader(ti, tj)
                .map_err(|source| RefineError::Shard { source })?;
            refiner.seed(&mut shard)?;
            refiner.replay(left_strip.as_ref(), top_strips[tj].as_ref())?;
            refiner.run()?;
            let stats = refiner.into_stats();

            mesh.finalize();
            mesh.validate()?;
            let tile_stats = write_tile(
                &mut writer,
                &mesh,
                left_strip.as_ref(),
                top_strips[tj].as_ref(),
            )
            .map_err(|source| tin_file_error(output, source))?;
            debug!(
                ti,
                tj,
                triangles = tile_stats.triangles,
                points = tile_stats.points,
                promoted = stats.promoted,
                flips = stats.flips,
                "tile refined"
            );
            total_triangles += u64::from(tile_stats.triangles);
            total_points += u64::from(tile_stats.points);

            // This tile's strips replace the ones it consumed.
            left_strip = Some(mesh.right_strip());
            top_strips[tj] = Some(mesh.bottom_strip());
        }
    }

    // Patch the real totals into the header.
    let mut file = writer
        .into_inner()
        .map_err(|err| tin_file_error(output, err.into_error().into()))?;
    header.num_triangles = u32::try_from(total_triangles)
        .map_err(|_| tin_file_error(output, TinFileError::Format(String::from("triangle count overflow"))))?;
    header.num_points = u32::try_from(total_points)
        .map_err(|_| tin_file_error(output, TinFileError::Format(String::from("point count overflow"))))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| tin_file_error(output, err.into()))?;
    header
        .write_to(&mut file)
        .map_err(|err| tin_file_error(output, err.into()))?;

    let summary = RefineSummary {
        tiles: grid.num_tiles() as u32,
        triangles: total_triangles,
        points: total_points,
        raster_cells: h.cells(),
        epsilon_absolute: epsilon,
        elapsed: started.elapsed(),
    };
    info!(
        triangles = summary.triangles,
        points = summary.points,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "refinement finished"
    );
    Ok(summary)
}
