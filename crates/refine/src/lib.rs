//! Raster-to-TIN refinement: the per-tile error-driven refinement loop and
//! the orchestrator that streams a tiled raster through it, replaying shared
//! boundary vertices so the global mesh stays seamless.

mod orchestrator;
mod refiner;

pub use orchestrator::{refine_raster, RefineSummary};

use std::path::PathBuf;

use thiserror::Error;

use retin_grid::GridError;
use retin_io::TinFileError;
use retin_mesh::MeshError;

/// Refinement parameters of one run.
#[derive(Clone, Copy, Debug)]
pub struct RefineParams {
    /// Vertical error tolerance as a percentage of the raster's elevation
    /// range.
    pub epsilon_percent: f64,
    /// Memory budget controlling the tile side length.
    pub memory_limit_mb: f64,
    /// Keep nodata cells, remapped to one below the minimum elevation,
    /// instead of dropping them.
    pub use_nodata: bool,
    /// Restore the Delaunay property after every insertion.
    pub delaunay: bool,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            epsilon_percent: 1.0,
            memory_limit_mb: 250.0,
            use_nodata: false,
            delaunay: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum RefineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("failed reading a tile sample shard")]
    Shard {
        #[source]
        source: std::io::Error,
    },
    #[error("failed writing TIN file {path}")]
    TinFile {
        path: PathBuf,
        #[source]
        source: TinFileError,
    },
}
