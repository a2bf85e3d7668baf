//! Raster input handling for the TIN refinement pipeline.
//!
//! The only supported exchange format is the arc-ascii grid (six header
//! lines, then row-major whitespace-separated samples). Rasters too large
//! for memory never materialise here: [`TiledGrid::build`] streams the file
//! once, fanning every sample out into the binary shard of each tile whose
//! window contains it.

mod ascii;
mod tiled;

pub use ascii::{read_grid, write_grid, Grid, GridHeader};
pub use tiled::{tiles_along, TiledGrid};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("raster I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid raster: {0}")]
    InvalidRaster(String),
}

impl GridError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
