//! Placement of a raster in world coordinates.

use std::{fmt, str::FromStr};

use crate::error::GeoError;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Origin is the top-left corner. Pixels are square, rows run southwards.
pub struct GeoReference {
    origin_x: f64,
    origin_y: f64,
    resolution: f64,
    rows: usize,
    cols: usize,
}

impl GeoReference {
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        resolution: f64,
        rows: usize,
        cols: usize,
    ) -> Result<Self, GeoError> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(GeoError::InvalidResolution(resolution));
        }
        if rows == 0 || cols == 0 {
            return Err(GeoError::InvalidDimensions(rows, cols));
        }

        Ok(GeoReference {
            origin_x,
            origin_y,
            resolution,
            rows,
            cols,
        })
    }

    pub fn origin_x(&self) -> f64 {
        self.origin_x
    }

    pub fn origin_y(&self) -> f64 {
        self.origin_y
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// GDAL-style affine transform `[origin_x, res, 0, origin_y, 0, -res]`.
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.resolution,
            0.0,
            self.origin_y,
            0.0,
            -self.resolution,
        ]
    }

    pub fn bounds(&self) -> BoundingBox {
        let max_x = self.origin_x + self.cols as f64 * self.resolution;
        let min_y = self.origin_y - self.rows as f64 * self.resolution;

        BoundingBox {
            min_x: self.origin_x,
            max_x,
            min_y,
            max_y: self.origin_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self, GeoError> {
        let bbox = BoundingBox {
            min_x,
            max_x,
            min_y,
            max_y,
        };

        if bbox.is_valid() {
            Ok(bbox)
        } else {
            Err(GeoError::InvalidBox {
                min_x,
                max_x,
                min_y,
                max_y,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_x < self.max_x && self.min_y < self.max_y
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Grows the box by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            max_x: self.max_x + margin,
            min_y: self.min_y - margin,
            max_y: self.max_y + margin,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

impl FromStr for BoundingBox {
    type Err = GeoError;

    /// Parses `min_x,max_x,min_y,max_y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = parse_floats(s, 4, "min_x,max_x,min_y,max_y")?;
        BoundingBox::new(values[0], values[1], values[2], values[3])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Whole-pixel shift applied to a clip window, not to its geo-origin.
pub struct PixelOffset {
    pub x: i64,
    pub y: i64,
}

impl FromStr for PixelOffset {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || GeoError::Parse {
            expected: "x,y",
            input: s.to_string(),
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(parse_err());
        }
        let x = parts[0].parse().map_err(|_| parse_err())?;
        let y = parts[1].parse().map_err(|_| parse_err())?;

        Ok(PixelOffset { x, y })
    }
}

fn parse_floats(s: &str, count: usize, expected: &'static str) -> Result<Vec<f64>, GeoError> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| GeoError::Parse {
            expected,
            input: s.to_string(),
        })?;

    if values.len() != count {
        return Err(GeoError::Parse {
            expected,
            input: s.to_string(),
        });
    }

    Ok(values)
}

// -- Tests -------------------------------------------------------------------
