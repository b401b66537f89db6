//! Cuts a bounding box out of a raster by pixel window.
//!
//! The window edges are rounded asymmetrically: the bottom and right edges
//! use ceiling so partially covered boundary pixels are kept, the top and
//! left edges use nearest (ties to even). Existing products were cut with
//! this rule and must stay reproducible, so it lives in [`LEGACY_ROUNDING`].

use ndarray::s;
use tracing::debug;

use super::{BoundingBox, GeoReference, PixelOffset, RasterGrid};
use crate::error::ClipError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRounding {
    Ceil,
    Floor,
    /// Round half to even.
    Nearest,
}

impl EdgeRounding {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            EdgeRounding::Ceil => value.ceil(),
            EdgeRounding::Floor => value.floor(),
            EdgeRounding::Nearest => value.round_ties_even(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Rounding applied to each edge of a clip window.
pub struct ClipRounding {
    pub top: EdgeRounding,
    pub bottom: EdgeRounding,
    pub left: EdgeRounding,
    pub right: EdgeRounding,
}

pub const LEGACY_ROUNDING: ClipRounding = ClipRounding {
    top: EdgeRounding::Nearest,
    bottom: EdgeRounding::Ceil,
    left: EdgeRounding::Nearest,
    right: EdgeRounding::Ceil,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open pixel window `[row_start, row_end) x [col_start, col_end)`.
pub struct ClipWindow {
    pub row_start: i64,
    pub row_end: i64,
    pub col_start: i64,
    pub col_end: i64,
}

impl ClipWindow {
    pub fn compute(georef: &GeoReference, bbox: &BoundingBox) -> Result<Self, ClipError> {
        Self::compute_with(georef, bbox, &LEGACY_ROUNDING)
    }

    pub fn compute_with(
        georef: &GeoReference,
        bbox: &BoundingBox,
        rounding: &ClipRounding,
    ) -> Result<Self, ClipError> {
        if !bbox.is_valid() {
            return Err(ClipError::InvalidBox {
                min_x: bbox.min_x,
                max_x: bbox.max_x,
                min_y: bbox.min_y,
                max_y: bbox.max_y,
            });
        }

        let res = georef.resolution();
        let row_end = rounding.bottom.apply((georef.origin_y() - bbox.min_y) / res) as i64;
        let row_start = rounding.top.apply((georef.origin_y() - bbox.max_y) / res) as i64;
        let col_start = rounding.left.apply((bbox.min_x - georef.origin_x()) / res) as i64;
        let col_end = rounding.right.apply((bbox.max_x - georef.origin_x()) / res) as i64;

        Ok(ClipWindow {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    /// `(rows, cols)`, negative when the window is inverted.
    pub fn shape(&self) -> (i64, i64) {
        (self.row_end - self.row_start, self.col_end - self.col_start)
    }

    pub fn shifted(&self, offset: PixelOffset) -> ClipWindow {
        ClipWindow {
            row_start: self.row_start + offset.y,
            row_end: self.row_end + offset.y,
            col_start: self.col_start + offset.x,
            col_end: self.col_end + offset.x,
        }
    }

    /// Fails instead of clamping when the window leaves `rows x cols`.
    pub fn validate(&self, rows: usize, cols: usize) -> Result<(), ClipError> {
        let (height, width) = self.shape();
        if height <= 0 || width <= 0 {
            return Err(ClipError::EmptyWindow {
                row_start: self.row_start,
                row_end: self.row_end,
                col_start: self.col_start,
                col_end: self.col_end,
            });
        }

        let fits = |start: i64, end: i64, len: usize| start >= 0 && end <= len as i64;
        if !fits(self.row_start, self.row_end, rows) || !fits(self.col_start, self.col_end, cols) {
            return Err(ClipError::OutOfBounds {
                row_start: self.row_start,
                row_end: self.row_end,
                col_start: self.col_start,
                col_end: self.col_end,
                rows,
                cols,
            });
        }

        Ok(())
    }
}

/// Clips `grid` to `bbox`.
///
/// `offset` moves the extracted window by whole pixels while the returned
/// origin stays where the unshifted window puts it. The result owns its data.
pub fn clip(
    grid: &RasterGrid,
    bbox: &BoundingBox,
    offset: PixelOffset,
) -> Result<RasterGrid, ClipError> {
    let (rows, cols) = grid.dim();
    let window = ClipWindow::compute(&grid.georef, bbox)?;
    let shifted = window.shifted(offset);
    shifted.validate(rows, cols)?;

    let data = grid
        .data
        .slice(s![
            shifted.row_start as usize..shifted.row_end as usize,
            shifted.col_start as usize..shifted.col_end as usize
        ])
        .to_owned();

    let res = grid.georef.resolution();
    let (clip_rows, clip_cols) = data.dim();
    let georef = GeoReference::new(
        grid.georef.origin_x() + window.col_start as f64 * res,
        grid.georef.origin_y() - window.row_start as f64 * res,
        res,
        clip_rows,
        clip_cols,
    )
    .map_err(|_| ClipError::EmptyWindow {
        row_start: shifted.row_start,
        row_end: shifted.row_end,
        col_start: shifted.col_start,
        col_end: shifted.col_end,
    })?;

    debug_assert!(bbox.expanded(res).contains(&georef.bounds()));
    debug!("Clipping array with bounds: {}", bbox);
    debug!("Clipped data shape: ({}, {})", clip_rows, clip_cols);

    Ok(RasterGrid {
        data,
        georef,
        projection: grid.projection.clone(),
    })
}

// -- Tests -------------------------------------------------------------------
