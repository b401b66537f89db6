//! Area-of-interest providers. Every source resolves to one bounding box.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::AoiError,
    raster::{io::read_georef, BoundingBox},
};

const SHP_FILE_CODE: i32 = 9994;
const SHP_HEADER_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum AoiSource {
    Literal(BoundingBox),
    /// Extent from an ESRI shapefile's main file header.
    Shapefile(PathBuf),
    /// Extent from an ESRI ASCII grid header.
    AsciiGrid(PathBuf),
    /// Extent of a georeferenced GeoTIFF.
    Raster(PathBuf),
}

impl fmt::Display for AoiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AoiSource::Literal(bbox) => write!(f, "bounds {}", bbox),
            AoiSource::Shapefile(path) => write!(f, "shapefile {}", path.display()),
            AoiSource::AsciiGrid(path) => write!(f, "ASCII grid {}", path.display()),
            AoiSource::Raster(path) => write!(f, "raster {}", path.display()),
        }
    }
}

impl AoiSource {
    pub fn resolve(&self) -> Result<BoundingBox, AoiError> {
        let bbox = match self {
            AoiSource::Literal(bbox) => *bbox,
            AoiSource::Shapefile(path) => shapefile_bounds(path)?,
            AoiSource::AsciiGrid(path) => ascii_grid_bounds(path)?,
            AoiSource::Raster(path) => read_georef(path)?.bounds(),
        };
        debug!("AOI from {} resolved to {}", self, bbox);

        Ok(bbox)
    }
}

/// Reads the bounding box stored in bytes 36..68 of a `.shp` header.
fn shapefile_bounds(path: &Path) -> Result<BoundingBox, AoiError> {
    let bytes = fs::read(path).map_err(|source| AoiError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let malformed = |reason: &str| AoiError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if bytes.len() < SHP_HEADER_LEN {
        return Err(malformed("file shorter than the 100 byte header"));
    }

    let file_code = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if file_code != SHP_FILE_CODE {
        return Err(malformed("not a shapefile"));
    }

    let read_f64 = |offset: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[offset..offset + 8]);
        f64::from_le_bytes(buf)
    };

    // header order is xmin, ymin, xmax, ymax
    let (min_x, min_y, max_x, max_y) = (read_f64(36), read_f64(44), read_f64(52), read_f64(60));

    Ok(BoundingBox::new(min_x, max_x, min_y, max_y)?)
}

/// Extent of an ESRI ASCII grid from its header.
///
/// Accepts both `xllcorner`/`yllcorner` and `xllcenter`/`yllcenter`.
fn ascii_grid_bounds(path: &Path) -> Result<BoundingBox, AoiError> {
    let text = fs::read_to_string(path).map_err(|source| AoiError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let malformed = |reason: String| AoiError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let mut ncols = None;
    let mut nrows = None;
    let mut xll = None;
    let mut yll = None;
    let mut centered = false;
    let mut cellsize = None;

    for line in text.lines().take(6) {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let value: f64 = value
            .parse()
            .map_err(|_| malformed(format!("bad value for {}: {}", key, value)))?;

        match key.to_ascii_lowercase().as_str() {
            "ncols" => ncols = Some(value),
            "nrows" => nrows = Some(value),
            "xllcorner" => xll = Some(value),
            "yllcorner" => yll = Some(value),
            "xllcenter" => {
                xll = Some(value);
                centered = true;
            }
            "yllcenter" => {
                yll = Some(value);
                centered = true;
            }
            "cellsize" => cellsize = Some(value),
            _ => {}
        }
    }

    let missing = |key: &str| malformed(format!("header has no {}", key));
    let ncols = ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = nrows.ok_or_else(|| missing("nrows"))?;
    let mut xll = xll.ok_or_else(|| missing("xllcorner"))?;
    let mut yll = yll.ok_or_else(|| missing("yllcorner"))?;
    let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;

    if centered {
        xll -= cellsize / 2.0;
        yll -= cellsize / 2.0;
    }

    Ok(BoundingBox::new(
        xll,
        xll + ncols * cellsize,
        yll,
        yll + nrows * cellsize,
    )?)
}

// -- Tests -------------------------------------------------------------------
