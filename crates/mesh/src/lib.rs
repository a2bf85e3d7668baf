//! The per-tile triangle mesh of the TIN refinement engine.
//!
//! A [`TileMesh`] owns its points and triangles in index-addressed arenas,
//! keeps the indexed max-error heap that drives refinement, tracks the three
//! inserted-vertex arrays and the lower-left traversal anchor, and exposes the
//! edge-walk that visits every triangle exactly three times.
//!
//! Mutation of the triangulation itself (splits, flips, sample
//! redistribution) lives with the refiner; this crate provides the primitive
//! operations the refiner composes: triangle creation with symmetric
//! neighbour wiring, neighbour lookup across an edge, tombstoning, heap
//! bookkeeping and anchor maintenance.

mod bucket;
mod heap;
mod store;
mod tile;
mod walk;

pub use bucket::Bucket;
pub use heap::Empty;
pub use store::{PointId, TriId};
pub use tile::{
    tile_len_for_memory, Anchor, BoundaryStrip, MeshError, TileBounds, TileMesh,
};
pub use walk::Visits;
