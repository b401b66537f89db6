//! Normalised-difference indices from 4-band PlanetScope scenes.
//!
//! Bands are ordered blue, green, red, near-infrared.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use ndarray::{Array2, Zip};
use tracing::{debug, info};

use crate::{
    error::RasterError,
    raster::io::{self as raster_io, MultibandRaster},
};

pub const SCENE_SUFFIX: &str = "AnalyticMS_SR_clip.tif";
pub const INDEX_NODATA: f32 = -9999.0;
pub const RGB_DIR: &str = "RGB";

const BLUE: usize = 0;
const GREEN: usize = 1;
const RED: usize = 2;
const NIR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralIndex {
    /// Vegetation, NIR against red.
    Ndvi,
    /// Blue snow threshold, NIR against blue.
    Bst,
    /// Green snow threshold, NIR against green.
    Gst,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 3] = [SpectralIndex::Ndvi, SpectralIndex::Bst, SpectralIndex::Gst];

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Bst => "BST",
            SpectralIndex::Gst => "GST",
        }
    }

    fn paired_band(&self) -> usize {
        match self {
            SpectralIndex::Ndvi => RED,
            SpectralIndex::Bst => BLUE,
            SpectralIndex::Gst => GREEN,
        }
    }

    /// `(NIR - X) / (NIR + X)`, 0 where the denominator is 0.
    pub fn compute(&self, raster: &MultibandRaster) -> Result<Array2<f32>> {
        if raster.bands.len() < 4 {
            bail!("Expected 4 bands (B, G, R, NIR), found {}", raster.bands.len());
        }

        let nir = &raster.bands[NIR];
        let other = &raster.bands[self.paired_band()];

        Ok(Zip::from(nir).and(other).map_collect(|&n, &x| {
            let (n, x) = (n as f64, x as f64);
            let denominator = n + x;
            if denominator == 0.0 {
                0.0
            } else {
                ((n - x) / denominator) as f32
            }
        }))
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scene files in `dir` ending in `AnalyticMS_SR_clip.tif`, sorted.
pub fn find_scenes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scenes: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Could not read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SCENE_SUFFIX))
        })
        .collect();
    scenes.sort();

    Ok(scenes)
}

/// `<output_dir>/<INDEX>/<base>_<INDEX>_width_<w>px.tif`
pub fn output_path(output_dir: &Path, scene: &Path, index: SpectralIndex, width: usize) -> PathBuf {
    let file_name = scene
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();

    output_dir
        .join(index.name())
        .join(format!("{}_{}_width_{}px.tif", base, index.name(), width))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub scenes: usize,
    pub used: usize,
    pub written: usize,
    pub existing: usize,
}

/// Writes every index for each scene larger than `min_size` pixels in both
/// directions, and copies those scenes to `<output_dir>/RGB`.
pub fn process_scenes(scenes: &[PathBuf], output_dir: &Path, min_size: usize) -> Result<IndexReport> {
    let mut report = IndexReport {
        scenes: scenes.len(),
        ..Default::default()
    };

    let mut usable = Vec::new();
    for scene in scenes {
        let (width, height) = raster_io::dimensions(scene)
            .with_context(|| format!("Unable to open file: {}", scene.display()))?;
        if width > min_size && height > min_size {
            usable.push((scene, width));
        } else {
            debug!("{} is only {}x{} px, not covering the AOI", scene.display(), width, height);
        }
    }

    if usable.is_empty() {
        bail!("No scenes larger than {} px found", min_size);
    }

    let rgb_dir = output_dir.join(RGB_DIR);
    fs::create_dir_all(&rgb_dir)?;
    for index in SpectralIndex::ALL {
        fs::create_dir_all(output_dir.join(index.name()))?;
    }

    for (scene, width) in usable {
        if let Some(file_name) = scene.file_name() {
            fs::copy(scene, rgb_dir.join(file_name))?;
        }

        let raster = raster_io::read_bands_u16(scene)
            .with_context(|| format!("Could not read bands of {}", scene.display()))?;

        for index in SpectralIndex::ALL {
            let data = index.compute(&raster)?;
            let out = output_path(output_dir, scene, index, width);

            match raster_io::write_float_grid(&out, &data, &raster.georef, &raster.projection, INDEX_NODATA) {
                Ok(()) => {
                    info!("{} written to {}", index, out.display());
                    report.written += 1;
                }
                Err(RasterError::AlreadyExists(path)) => {
                    info!("{} already exists, skipping", path.display());
                    report.existing += 1;
                }
                Err(e) => return Err(e).with_context(|| format!("Could not write {}", out.display())),
            }
        }
        report.used += 1;
    }

    Ok(report)
}

// -- Tests -------------------------------------------------------------------
