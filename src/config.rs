//! Run configuration for the daily aggregation pipeline.

use std::path::{self, Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::TimeDelta;

use crate::{
    aoi::AoiSource,
    cli::{AoiArgs, ProcessArgs},
    raster::PixelOffset,
    reclass::Reclassification,
    scene::Product,
};

pub const DEFAULT_NODATA: u8 = 255;
pub const DEFAULT_TABLE_NAME: &str = "results.csv";

#[derive(Debug, Clone)]
pub struct Config {
    pub product: Product,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Scratch space for extracted rasters; a fresh temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    pub table_path: PathBuf,
    pub aoi: AoiSource,
    pub nodata: u8,
    pub variant: Reclassification,
    pub bucket_granularity: TimeDelta,
    pub pixel_offset: PixelOffset,
    pub output_prefix: String,
}

impl Config {
    /// Config with the product's defaults.
    pub fn new(product: Product, data_dir: PathBuf, output_dir: PathBuf, aoi: AoiSource) -> Self {
        let table_path = output_dir.join(DEFAULT_TABLE_NAME);

        Config {
            product,
            data_dir,
            output_dir,
            temp_dir: None,
            table_path,
            aoi,
            nodata: DEFAULT_NODATA,
            variant: default_variant(product),
            bucket_granularity: TimeDelta::hours(1),
            pixel_offset: PixelOffset::default(),
            output_prefix: product.default_output_prefix().to_string(),
        }
    }

    pub fn from_args(args: &ProcessArgs) -> Result<Self> {
        let mut config = Config::new(
            args.product,
            args.data_dir.clone(),
            args.output_dir.clone(),
            aoi_source(&args.aoi)?,
        );

        config.temp_dir = args.temp_dir.clone();
        if let Some(table) = &args.table {
            config.table_path = table.clone();
        }
        config.nodata = args.nodata;
        if let Some(variant) = args.variant {
            config.variant = variant;
        }
        config.bucket_granularity = TimeDelta::minutes(args.bucket_minutes as i64);
        if let Some(offset) = args.pixel_offset {
            config.pixel_offset = offset;
        }
        if let Some(prefix) = &args.output_prefix {
            config.output_prefix = prefix.clone();
        }

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            bail!("Data directory {} does not exist", self.data_dir.display());
        }
        if self.bucket_granularity <= TimeDelta::zero() {
            bail!("Bucket granularity must be positive");
        }
        if self.output_prefix.is_empty() || self.output_prefix.contains(std::path::MAIN_SEPARATOR) {
            bail!("Invalid output prefix: {:?}", self.output_prefix);
        }
        if let Some(temp_dir) = &self.temp_dir {
            let temp = resolve(temp_dir)?;
            let table_dir = self
                .table_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let guarded = [
                ("data", self.data_dir.as_path()),
                ("output", self.output_dir.as_path()),
                ("results table", table_dir),
            ];
            for (role, dir) in guarded {
                if resolve(dir)?.starts_with(&temp) {
                    bail!(
                        "Temp directory {} must not be or contain the {} directory {}",
                        temp_dir.display(),
                        role,
                        dir.display()
                    );
                }
            }
        }

        Ok(())
    }
}

/// Absolute form of `dir` with links, `.` and `..` resolved as far as it exists.
fn resolve(dir: &Path) -> Result<PathBuf> {
    let absolute =
        path::absolute(dir).with_context(|| format!("Could not resolve {}", dir.display()))?;
    for existing in absolute.ancestors() {
        if let Ok(base) = existing.canonicalize() {
            let rest = absolute.strip_prefix(existing)?;
            return Ok(base.join(rest));
        }
    }

    Ok(absolute)
}

fn default_variant(product: Product) -> Reclassification {
    match product {
        Product::Sws => Reclassification::Binary,
        Product::Fsc => Reclassification::Fsc,
    }
}

fn aoi_source(args: &AoiArgs) -> Result<AoiSource> {
    let source = match (&args.aoi_bounds, &args.aoi_shapefile, &args.aoi_grid, &args.aoi_raster) {
        (Some(bbox), _, _, _) => AoiSource::Literal(*bbox),
        (_, Some(path), _, _) => AoiSource::Shapefile(path.clone()),
        (_, _, Some(path), _) => AoiSource::AsciiGrid(path.clone()),
        (_, _, _, Some(path)) => AoiSource::Raster(path.clone()),
        _ => bail!("No area of interest given"),
    };

    Ok(source)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn process_args(args: &[&str]) -> ProcessArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Process(args) => args,
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn should_build_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().to_str().unwrap();
        let args = process_args(&[
            "snowcover",
            "process",
            "--data-dir",
            data,
            "--output-dir",
            "/tmp/out",
            "--aoi-bounds",
            "0,100,0,100",
        ]);

        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.product, Product::Sws);
        assert_eq!(config.nodata, 255);
        assert_eq!(config.variant, Reclassification::Binary);
        assert_eq!(config.bucket_granularity, TimeDelta::hours(1));
        assert_eq!(config.output_prefix, "SWS");
        assert_eq!(config.table_path, PathBuf::from("/tmp/out/results.csv"));
        assert!(matches!(config.aoi, AoiSource::Literal(_)));
    }

    #[test]
    fn should_apply_overrides() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().to_str().unwrap();
        let args = process_args(&[
            "snowcover",
            "process",
            "--product",
            "fsc",
            "--data-dir",
            data,
            "--output-dir",
            "/tmp/out",
            "--aoi-grid",
            "/tmp/mask.asc",
            "--variant",
            "fine",
            "--bucket-minutes",
            "30",
            "--pixel-offset",
            "1,-1",
            "--nodata",
            "0",
        ]);

        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.product, Product::Fsc);
        assert_eq!(config.output_prefix, "FSC_HOPI");
        assert_eq!(config.variant, Reclassification::Fine);
        assert_eq!(config.bucket_granularity, TimeDelta::minutes(30));
        assert_eq!(config.pixel_offset, PixelOffset { x: 1, y: -1 });
        assert_eq!(config.nodata, 0);
        assert_eq!(config.aoi, AoiSource::AsciiGrid(PathBuf::from("/tmp/mask.asc")));
    }

    #[test]
    fn should_require_exactly_one_aoi_source() {
        let none = Cli::try_parse_from([
            "snowcover", "process", "--data-dir", "/d", "--output-dir", "/o",
        ]);
        let both = Cli::try_parse_from([
            "snowcover", "process", "--data-dir", "/d", "--output-dir", "/o",
            "--aoi-bounds", "0,1,0,1", "--aoi-grid", "/m.asc",
        ]);

        assert!(none.is_err());
        assert!(both.is_err());
    }

    #[test]
    fn should_reject_missing_data_dir() {
        let config = Config::new(
            Product::Sws,
            PathBuf::from("/does/not/exist"),
            PathBuf::from("/tmp/out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );

        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_temp_dir_equal_to_data() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(
            Product::Sws,
            dir.path().to_path_buf(),
            PathBuf::from("/tmp/out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );
        config.temp_dir = Some(dir.path().to_path_buf());

        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_temp_dir_above_data() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let mut config = Config::new(
            Product::Sws,
            data,
            dir.path().join("out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );
        config.temp_dir = Some(dir.path().to_path_buf());

        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_temp_dir_spelled_differently() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let mut config = Config::new(
            Product::Sws,
            data.clone(),
            dir.path().join("out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );
        config.temp_dir = Some(data.join(".").join("..").join("data"));

        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_temp_dir_holding_results_table() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let mut config = Config::new(
            Product::Sws,
            data,
            dir.path().join("out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );
        config.table_path = dir.path().join("tables").join("results.csv");
        config.temp_dir = Some(dir.path().join("tables"));

        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_separate_temp_dir() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let mut config = Config::new(
            Product::Sws,
            data,
            dir.path().join("out"),
            AoiSource::Shapefile(PathBuf::from("aoi.shp")),
        );
        config.temp_dir = Some(dir.path().join("scratch"));

        assert!(config.validate().is_ok());
    }
}
