//! Geometric primitives of the TIN refinement engine: the raster point type
//! and the pure predicates (orientation, point-in-triangle, in-circumcircle)
//! together with plane interpolation and the per-sample approximation error.
//!
//! Coordinates are integer grid indices so the orientation predicate is
//! exact; only interpolation and the circumcircle test go through floating
//! point.

mod point;
mod predicates;

pub use point::{Coord, Elev, Point};
pub use predicates::{
    in_circumcircle, in_triangle, interpolate, sample_error, signed_area, Orientation,
};
