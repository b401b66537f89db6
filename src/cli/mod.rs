//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    raster::{BoundingBox, PixelOffset},
    reclass::Reclassification,
    scene::Product,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append log output to this file
    #[arg(long, global = true, env = "SNOWCOVER_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clip, reclassify and aggregate snow-cover archives per day
    Process(ProcessArgs),
    /// Download archives listed in a query manifest
    Fetch {
        /// Query result file, one `;`-separated product per line
        #[arg(long)]
        manifest: PathBuf,
        /// Directory holding the downloaded archives
        #[arg(long, env = "SNOWCOVER_DATA_DIR")]
        data_dir: PathBuf,
    },
    /// Compute NDVI, BST and GST rasters from PlanetScope scenes
    Indices {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        /// Scenes must be wider and taller than this many pixels
        #[arg(long, default_value_t = 200)]
        min_size: usize,
    },
    /// Group PlanetScope scene dates into spans
    Spans {
        #[arg(long)]
        dir: PathBuf,
        /// Longest distance in days from the first date of a span
        #[arg(long, default_value_t = 7)]
        span_days: i64,
    },
    /// Convert a results table to parquet
    Export {
        #[arg(long, env = "SNOWCOVER_TABLE")]
        table: PathBuf,
        /// Defaults to `~/snowcover-<product>-<date>.parquet`
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Product::Sws)]
        product: Product,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    #[arg(long, value_enum, env = "SNOWCOVER_PRODUCT", default_value_t = Product::Sws)]
    pub product: Product,

    /// Directory of product archives
    #[arg(long, env = "SNOWCOVER_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Directory for the daily rasters
    #[arg(long, env = "SNOWCOVER_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Scratch directory, cleared for every bucket
    #[arg(long, env = "SNOWCOVER_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Results table, defaults to `<output-dir>/results.csv`
    #[arg(long, env = "SNOWCOVER_TABLE")]
    pub table: Option<PathBuf>,

    #[command(flatten)]
    pub aoi: AoiArgs,

    /// No-data sentinel value
    #[arg(long, env = "SNOWCOVER_NODATA", default_value_t = 255)]
    pub nodata: u8,

    /// Reclassification, defaults to `binary` for SWS and `fsc` for FSC
    #[arg(long, value_enum, env = "SNOWCOVER_VARIANT")]
    pub variant: Option<Reclassification>,

    /// Scenes are bucketed by acquisition time rounded to this many minutes
    #[arg(long, env = "SNOWCOVER_BUCKET_MINUTES", default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    pub bucket_minutes: u32,

    /// Whole-pixel shift of the clip window, as `x,y`
    #[arg(long, env = "SNOWCOVER_PIXEL_OFFSET", allow_hyphen_values = true)]
    pub pixel_offset: Option<PixelOffset>,

    /// File name prefix of the daily rasters
    #[arg(long, env = "SNOWCOVER_OUTPUT_PREFIX")]
    pub output_prefix: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct AoiArgs {
    /// Literal bounds as `min_x,max_x,min_y,max_y`
    #[arg(long, allow_hyphen_values = true)]
    pub aoi_bounds: Option<BoundingBox>,

    /// Extent of an ESRI shapefile
    #[arg(long)]
    pub aoi_shapefile: Option<PathBuf>,

    /// Extent of an ESRI ASCII grid
    #[arg(long)]
    pub aoi_grid: Option<PathBuf>,

    /// Extent of a GeoTIFF
    #[arg(long)]
    pub aoi_raster: Option<PathBuf>,
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------
