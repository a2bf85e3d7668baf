//! The finished-mesh file format.
//!
//! A single binary file: a global header, then one block per tile. Each tile
//! block starts with a twelve-field marker (three zeroed pseudo-point records
//! and a sentinel triangle count), its own header, and one record per
//! traversal visit. A triangle is visited three times, so it appears three
//! times; every vertex is written with its index into the tile's combined
//! sorted vertex arrays, which lets the reader de-duplicate, and consecutive
//! records always share an edge, which lets the reader restore neighbour
//! links without storing them.

mod header;
mod read;
mod write;

pub use header::TinHeader;
pub use read::{read_tin, LoadedTile, LoadedTriangle, Tin};
pub use write::{write_tile, TileStats};

use retin_geometry::Point;
use thiserror::Error;

/// Elevation field of the three pseudo-points that announce a tile block.
pub(crate) const TILE_MARKER_Z: i16 = -9999;
/// The sentinel triangle count is offset so it can never collide with a real
/// triangle index.
pub(crate) const TRI_MARKER_OFFSET: u32 = 10;

#[derive(Error, Debug)]
pub enum TinFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed TIN file: {0}")]
    Format(String),
    #[error("vertex {0:?} missing from the tile vertex arrays")]
    UnindexedVertex(Point),
}
