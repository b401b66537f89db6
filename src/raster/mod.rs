//! Single-band rasters, their georeferencing, and the operations on them.

pub mod clip;
pub mod georef;
pub mod io;
pub mod mosaic;

use std::fmt;

use ndarray::Array2;

use crate::error::GeoError;

pub use clip::clip;
pub use georef::{BoundingBox, GeoReference, PixelOffset};
pub use mosaic::Mosaic;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

#[derive(Debug, Clone, Default, PartialEq)]
/// Opaque coordinate reference, carried from input to output unchanged.
///
/// Holds the raw GeoTIFF key directory and its parameter tags.
pub struct Projection {
    pub geo_keys: Option<Vec<u16>>,
    pub geo_doubles: Option<Vec<f64>>,
    pub geo_ascii: Option<String>,
}

impl Projection {
    /// Minimal key directory for a projected EPSG code.
    pub fn from_epsg(code: u16) -> Self {
        let geo_keys = vec![
            1, 1, 0, 2, //
            GT_MODEL_TYPE_KEY, 0, 1, 1, //
            PROJECTED_CS_TYPE_KEY, 0, 1, code,
        ];

        Projection {
            geo_keys: Some(geo_keys),
            geo_doubles: None,
            geo_ascii: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.geo_keys.is_none()
    }

    /// EPSG code of the projected or geographic CRS, if stated inline.
    pub fn epsg(&self) -> Option<u16> {
        let keys = self.geo_keys.as_ref()?;
        let count = *keys.get(3)? as usize;

        let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();
        let inline = |wanted: u16| {
            entries
                .iter()
                .find(|e| e[0] == wanted && e[1] == 0)
                .map(|e| e[3])
        };

        inline(PROJECTED_CS_TYPE_KEY).or_else(|| inline(GEOGRAPHIC_TYPE_KEY))
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.epsg(), &self.geo_ascii) {
            (Some(code), _) => write!(f, "EPSG:{}", code),
            (None, Some(citation)) => write!(f, "{}", citation.trim_end_matches('|')),
            (None, None) if self.is_empty() => write!(f, "<none>"),
            (None, None) => write!(f, "<user-defined>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A `u8` sample array with its placement and CRS.
pub struct RasterGrid {
    pub data: Array2<u8>,
    pub georef: GeoReference,
    pub projection: Projection,
}

impl RasterGrid {
    /// Pairs data with a placement at the given origin, shape taken from `data`.
    pub fn new(
        data: Array2<u8>,
        origin_x: f64,
        origin_y: f64,
        resolution: f64,
        projection: Projection,
    ) -> Result<Self, GeoError> {
        let (rows, cols) = data.dim();
        let georef = GeoReference::new(origin_x, origin_y, resolution, rows, cols)?;

        Ok(RasterGrid {
            data,
            georef,
            projection,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_all(&self, value: u8) -> bool {
        self.data.iter().all(|&v| v == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Aggregate over the valid (non-sentinel) cells of a grid.
pub struct Summary {
    pub mean: f64,
    pub sum: f64,
    pub count: usize,
}

impl Summary {
    pub fn is_nan(&self) -> bool {
        self.mean.is_nan() || self.sum.is_nan()
    }
}

/// Mean and sum of every cell not equal to `sentinel`; NaN if none remain.
pub fn summarize(data: &Array2<u8>, sentinel: u8) -> Summary {
    let (sum, count) = data
        .iter()
        .filter(|&&v| v != sentinel)
        .fold((0.0_f64, 0_usize), |(sum, count), &v| (sum + v as f64, count + 1));

    if count == 0 {
        return Summary {
            mean: f64::NAN,
            sum: f64::NAN,
            count,
        };
    }

    Summary {
        mean: sum / count as f64,
        sum,
        count,
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn should_summarize_excluding_sentinel() {
        let data = array![[1, 0, 255], [1, 255, 1]];
        let summary = summarize(&data, 255);

        assert_eq!(summary.count, 4);
        assert_eq!(summary.sum, 3.0);
        assert_eq!(summary.mean, 0.75);
        assert!(!summary.is_nan());
    }

    #[test]
    fn should_give_nan_for_all_sentinel() {
        let data = Array2::from_elem((3, 3), 255u8);
        let summary = summarize(&data, 255);

        assert_eq!(summary.count, 0);
        assert!(summary.mean.is_nan());
        assert!(summary.sum.is_nan());
        assert!(summary.is_nan());
    }

    #[test]
    fn should_read_epsg_from_key_directory() {
        let projection = Projection::from_epsg(32632);

        assert_eq!(projection.epsg(), Some(32632));
        assert_eq!(projection.to_string(), "EPSG:32632");
        assert_eq!(Projection::default().epsg(), None);
        assert_eq!(Projection::default().to_string(), "<none>");
    }

    #[test]
    fn should_fall_back_to_geographic_code() {
        let projection = Projection {
            geo_keys: Some(vec![1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]),
            ..Default::default()
        };

        assert_eq!(projection.epsg(), Some(4326));
    }
}
