pub mod error;
pub mod support;
pub mod segment_polygons;
pub mod atl08;
pub mod utm;
pub mod footprints;

pub use error::{FootprintError, InvalidInputError};
pub use segment_polygons::{build_footprint_polygons, FootprintPolygon};
