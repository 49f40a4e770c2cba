use std::error::Error;
use std::fmt;

/// Raised when a track run is too short to estimate a ground direction.
///
/// Retrying with the same input cannot succeed; callers should skip the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidInputError {
    pub n_points: usize,
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ground direction needs at least two points, got {}", self.n_points)
    }
}

impl Error for InvalidInputError {}

/// Context for failures in the calling layer (reading shots, reprojecting,
/// writing footprints). Details are attached to the surrounding report.
#[derive(Debug, Clone, PartialEq)]
pub enum FootprintError {
    Read(String),
    MissingColumn(String),
    Parse(String),
    UnknownSegmentKind(String),
    InvalidDimension(f64),
    Projection(u32),
    InvalidRun(String),
    MixedCrs(Vec<u32>),
    Write(String),
}

impl fmt::Display for FootprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootprintError::Read(path) => write!(f, "could not read shots from {}", path),
            FootprintError::MissingColumn(name) => write!(f, "column {} not found in input header", name),
            FootprintError::Parse(path) => write!(f, "malformed shot record in {}", path),
            FootprintError::UnknownSegmentKind(tag) => write!(f, "no segment kind named {}", tag),
            FootprintError::InvalidDimension(value) => write!(f, "footprint width/length must be finite and > 0, got {}", value),
            FootprintError::Projection(epsg) => write!(f, "reprojection to/from EPSG:{} failed", epsg),
            FootprintError::InvalidRun(key) => write!(f, "could not build footprints for track {}", key),
            FootprintError::MixedCrs(epsgs) => write!(f, "footprints span several output CRS: {:?}", epsgs),
            FootprintError::Write(path) => write!(f, "could not write footprints to {}", path),
        }
    }
}

impl Error for FootprintError {}
