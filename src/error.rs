//! Typed errors for the raster, archive and AOI layers.
//!
//! Command-level code wraps these in `anyhow` with context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Resolution must be positive, got {0}")]
    InvalidResolution(f64),

    #[error("Raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Expected `{expected}`, got `{input}`")]
    Parse { expected: &'static str, input: String },

    #[error("Invalid bounding box: min_x={min_x}, max_x={max_x}, min_y={min_y}, max_y={max_y}")]
    InvalidBox {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipError {
    #[error("Invalid clip box: min_x={min_x}, max_x={max_x}, min_y={min_y}, max_y={max_y}")]
    InvalidBox {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    },

    #[error("Clip window rows {row_start}..{row_end}, cols {col_start}..{col_end} out of bounds for {rows}x{cols} raster")]
    OutOfBounds {
        row_start: i64,
        row_end: i64,
        col_start: i64,
        col_end: i64,
        rows: usize,
        cols: usize,
    },

    #[error("Clip window rows {row_start}..{row_end}, cols {col_start}..{col_end} is empty")]
    EmptyWindow {
        row_start: i64,
        row_end: i64,
        col_start: i64,
        col_end: i64,
    },
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Georeference error: {0}")]
    Geo(#[from] GeoError),

    #[error("Unsupported pixel format in {0}")]
    UnsupportedPixelFormat(PathBuf),

    #[error("No georeferencing tags in {0}")]
    MissingGeoreference(PathBuf),

    #[error("Rotated rasters are not supported: {0}")]
    Rotated(PathBuf),

    #[error("Non-square pixels ({0} x {1}) are not supported")]
    NonSquarePixels(f64, f64),

    #[error("Resolution mismatch: mosaic has {expected}, scene has {found}")]
    ResolutionMismatch { expected: f64, found: f64 },

    #[error("Output raster already exists: {0}")]
    AlreadyExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Could not open archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive {archive} has no member {member}")]
    MissingMember { archive: PathBuf, member: String },

    #[error("I/O error while extracting {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported archive type: {0}")]
    UnsupportedArchive(PathBuf),
}

#[derive(Error, Debug)]
pub enum AoiError {
    #[error("Could not read AOI source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed AOI source {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("AOI raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("AOI extent is not a valid box: {0}")]
    Geo(#[from] GeoError),
}
