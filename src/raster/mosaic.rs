//! Merges the clipped scenes of one day into a single grid.

use tracing::debug;

use super::{summarize, RasterGrid, Summary};
use crate::error::RasterError;

#[derive(Debug, Clone)]
/// Canvas seeded by the first scene. Later scenes only fill cells that
/// still hold the sentinel, so the first valid observation wins.
pub struct Mosaic {
    grid: RasterGrid,
    sentinel: u8,
    scenes: usize,
}

impl Mosaic {
    pub fn new(first: RasterGrid, sentinel: u8) -> Self {
        Mosaic {
            grid: first,
            sentinel,
            scenes: 1,
        }
    }

    /// Copies `scene` into the canvas, placed by its origin.
    ///
    /// Parts of the scene outside the canvas are ignored. Returns the number
    /// of cells that were filled.
    pub fn merge(&mut self, scene: &RasterGrid) -> Result<usize, RasterError> {
        let canvas = &self.grid.georef;
        let res = canvas.resolution();
        if (scene.georef.resolution() - res).abs() > 1e-9 * res {
            return Err(RasterError::ResolutionMismatch {
                expected: res,
                found: scene.georef.resolution(),
            });
        }

        let row_offset = ((canvas.origin_y() - scene.georef.origin_y()) / res).round() as i64;
        let col_offset = ((scene.georef.origin_x() - canvas.origin_x()) / res).round() as i64;
        let (rows, cols) = self.grid.dim();

        let mut filled = 0;
        for ((r, c), &value) in scene.data.indexed_iter() {
            if value == self.sentinel {
                continue;
            }

            let target_row = r as i64 + row_offset;
            let target_col = c as i64 + col_offset;
            if target_row < 0 || target_col < 0 || target_row >= rows as i64 || target_col >= cols as i64 {
                continue;
            }

            let cell = &mut self.grid.data[[target_row as usize, target_col as usize]];
            if *cell == self.sentinel {
                *cell = value;
                filled += 1;
            }
        }

        self.scenes += 1;
        debug!(
            "Merged scene at offset ({}, {}), {} cells filled",
            row_offset, col_offset, filled
        );

        Ok(filled)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.grid.data, self.sentinel)
    }

    pub fn into_grid(self) -> RasterGrid {
        self.grid
    }
}

// -- Tests -------------------------------------------------------------------
