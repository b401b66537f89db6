//! Day-level clip, reclassify, mosaic and aggregate pipeline.
//!
//! Buckets run one at a time, scenes within a bucket one at a time. The
//! temp area is shared by all buckets of a run and is not safe for two runs
//! at once.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    cli::create_progress_bar,
    config::Config,
    download::extract_member,
    error::RasterError,
    raster::{clip, io as raster_io, BoundingBox, Mosaic, RasterGrid},
    scene::{discover_scenes, group_into_buckets, DayBucket},
    table::{ResultRow, ResultTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Pending,
    Extracting,
    Clipping,
    Reclassifying,
    Aggregating,
    Persisted,
    Discarded,
    Skipped,
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BucketState::Pending => "pending",
            BucketState::Extracting => "extracting",
            BucketState::Clipping => "clipping",
            BucketState::Reclassifying => "reclassifying",
            BucketState::Aggregating => "aggregating",
            BucketState::Persisted => "persisted",
            BucketState::Discarded => "discarded",
            BucketState::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BucketOutcome {
    /// Raster written and row upserted.
    Persisted { path: PathBuf, row: ResultRow },
    /// No valid cells in any scene; any earlier row was removed.
    Discarded,
    /// Output raster already existed.
    Skipped,
}

impl BucketOutcome {
    pub fn state(&self) -> BucketState {
        match self {
            BucketOutcome::Persisted { .. } => BucketState::Persisted,
            BucketOutcome::Discarded => BucketState::Discarded,
            BucketOutcome::Skipped => BucketState::Skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub buckets: usize,
    pub persisted: usize,
    pub discarded: usize,
    pub skipped: usize,
    /// Scenes dropped for extraction or read failures.
    pub failed_scenes: usize,
    pub table_writes: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buckets: {} persisted, {} discarded, {} skipped ({} scenes failed, {} table writes)",
            self.buckets,
            self.persisted,
            self.discarded,
            self.skipped,
            self.failed_scenes,
            self.table_writes
        )
    }
}

/// Subdirectory of a configured temp dir that the pipeline owns.
pub const SCRATCH_DIR: &str = "snowcover-scratch";

/// Scratch directory for extracted rasters.
///
/// Only the pipeline's own directory is ever cleared, never the configured
/// directory it lives in.
pub struct TempArea {
    path: PathBuf,
    _owned: Option<TempDir>,
}

impl TempArea {
    /// Uses `<configured>/snowcover-scratch`, creating it if needed, or a
    /// fresh temp dir.
    pub fn new(configured: Option<&Path>) -> Result<Self> {
        match configured {
            Some(dir) => {
                let path = dir.join(SCRATCH_DIR);
                fs::create_dir_all(&path)
                    .with_context(|| format!("Could not create temp directory {}", path.display()))?;
                Ok(TempArea { path, _owned: None })
            }
            None => {
                let dir = TempDir::new()?;
                Ok(TempArea {
                    path: dir.path().to_path_buf(),
                    _owned: Some(dir),
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes everything inside the directory. Returns the entry count.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            debug!("Removed {}", path.display());
            removed += 1;
        }

        Ok(removed)
    }
}

/// Processes day buckets against one AOI.
pub struct DailyAggregator<'a> {
    config: &'a Config,
    aoi: BoundingBox,
    temp: TempArea,
    state: BucketState,
    failed_scenes: usize,
}

impl<'a> DailyAggregator<'a> {
    pub fn new(config: &'a Config, aoi: BoundingBox, temp: TempArea) -> Self {
        DailyAggregator {
            config,
            aoi,
            temp,
            state: BucketState::Pending,
            failed_scenes: 0,
        }
    }

    pub fn state(&self) -> BucketState {
        self.state
    }

    /// Scenes dropped so far because they could not be extracted or read.
    pub fn failed_scenes(&self) -> usize {
        self.failed_scenes
    }

    fn transition(&mut self, bucket: &DayBucket, state: BucketState) {
        debug!("Bucket {}: {} -> {}", bucket.key, self.state, state);
        self.state = state;
    }

    /// Runs one bucket to a terminal state and saves `table` to match.
    ///
    /// A clip geometry error is returned. Scene-level failures are logged
    /// and the scene is left out.
    pub fn process(&mut self, bucket: &DayBucket, table: &mut ResultTable) -> Result<BucketOutcome> {
        self.state = BucketState::Pending;

        let output_path = self
            .config
            .output_dir
            .join(bucket.output_file_name(&self.config.output_prefix));
        if output_path.exists() {
            info!(
                "File {} already exists, skipping processing",
                output_path.display()
            );
            if table.get(&bucket.key).is_none() {
                warn!(
                    "Bucket {} has a raster but no row in the results table; remove {} to recompute it",
                    bucket.key,
                    output_path.display()
                );
            }
            self.transition(bucket, BucketState::Skipped);
            return Ok(BucketOutcome::Skipped);
        }

        self.temp.clear()?;
        let mosaic = self.build_mosaic(bucket);
        self.temp.clear()?;
        let mosaic = mosaic?;

        let summary = mosaic.as_ref().map(Mosaic::summary);
        let (mosaic, summary) = match (mosaic, summary) {
            (Some(mosaic), Some(summary)) if !summary.is_nan() => (mosaic, summary),
            _ => {
                if table.remove(&bucket.key).is_some() {
                    info!("Removed row {} with no valid pixels", bucket.key);
                    table.save()?;
                }
                self.transition(bucket, BucketState::Discarded);
                return Ok(BucketOutcome::Discarded);
            }
        };

        info!(
            "Bucket {}: mean {:.4}, sum {} over {} cells",
            bucket.key, summary.mean, summary.sum, summary.count
        );

        // Row goes to disk first: an existing raster makes a re-run skip the bucket.
        let row = ResultRow {
            date: bucket.key,
            mean: summary.mean,
            sum: summary.sum,
        };
        table.upsert(row);
        table.save()?;

        raster_io::write_grid(&output_path, &mosaic.into_grid(), Some(self.config.nodata))
            .with_context(|| format!("Could not write {}", output_path.display()))?;
        self.transition(bucket, BucketState::Persisted);

        Ok(BucketOutcome::Persisted {
            path: output_path,
            row,
        })
    }

    fn build_mosaic(&mut self, bucket: &DayBucket) -> Result<Option<Mosaic>> {
        let grids = self.extract_scenes(bucket);

        self.transition(bucket, BucketState::Clipping);
        let mut clipped = Vec::with_capacity(grids.len());
        for (name, grid) in grids {
            let grid = clip(&grid, &self.aoi, self.config.pixel_offset)
                .with_context(|| format!("Could not clip {} to AOI {}", name, self.aoi))?;
            clipped.push((name, grid));
        }

        self.transition(bucket, BucketState::Reclassifying);
        let sentinel = self.config.nodata;
        let mut valid = Vec::with_capacity(clipped.len());
        for (name, mut grid) in clipped {
            self.config.variant.apply(&mut grid.data, sentinel);
            if grid.is_all(sentinel) {
                info!("Skipping scene {} as it contains only no-data values", name);
                continue;
            }
            valid.push((name, grid));
        }

        self.transition(bucket, BucketState::Aggregating);
        let mut scenes = valid.into_iter();
        let Some((_, first)) = scenes.next() else {
            return Ok(None);
        };

        let mut mosaic = Mosaic::new(first, sentinel);
        for (name, grid) in scenes {
            match mosaic.merge(&grid) {
                Ok(filled) => debug!("Scene {} filled {} cells", name, filled),
                Err(e @ RasterError::ResolutionMismatch { .. }) => {
                    warn!("Leaving scene {} out of the mosaic: {}", name, e)
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!("Mosaic of {} scenes", mosaic.scene_count());

        Ok(Some(mosaic))
    }

    fn extract_scenes(&mut self, bucket: &DayBucket) -> Vec<(String, RasterGrid)> {
        self.transition(bucket, BucketState::Extracting);

        let mut grids = Vec::with_capacity(bucket.scenes.len());
        for scene in &bucket.scenes {
            debug!("Extracting {} for tile {}", scene.name, scene.tile);
            let extracted = match extract_member(&scene.archive, &scene.member_name(), self.temp.path()) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Couldn't unzip file {}: {}", scene.archive.display(), e);
                    self.failed_scenes += 1;
                    continue;
                }
            };

            match raster_io::read_grid(&extracted) {
                Ok(grid) => grids.push((scene.name.clone(), grid)),
                Err(e) => {
                    warn!("Couldn't read raster {}: {}", extracted.display(), e);
                    self.failed_scenes += 1;
                }
            }
        }

        grids
    }
}

/// Runs every day bucket found in the data directory.
pub fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let aoi = config
        .aoi
        .resolve()
        .with_context(|| format!("Could not read area of interest from {}", config.aoi))?;
    info!("Area of interest {} from {}", aoi, config.aoi);

    let scenes = discover_scenes(&config.data_dir, config.product)?;
    let buckets = group_into_buckets(scenes, config.bucket_granularity);
    info!("{} scenes in {} buckets", buckets.iter().map(|b| b.scenes.len()).sum::<usize>(), buckets.len());

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Could not create {}", config.output_dir.display()))?;
    let mut table = ResultTable::load_or_default(&config.table_path)?;
    info!("Results table {} holds {} rows", config.table_path.display(), table.len());
    let temp = TempArea::new(config.temp_dir.as_deref())?;
    let mut aggregator = DailyAggregator::new(config, aoi, temp);

    let mut summary = RunSummary {
        buckets: buckets.len(),
        ..Default::default()
    };

    let pb = create_progress_bar(buckets.len() as u64, "Processing buckets".to_string());
    for bucket in &buckets {
        info!(
            "Processing {} with {} scenes",
            bucket.key.format("%Y-%m-%d %H:%M"),
            bucket.scenes.len()
        );

        let outcome = aggregator
            .process(bucket, &mut table)
            .with_context(|| format!("Bucket {} failed", bucket.key))?;

        debug!("Bucket {} ended {}", bucket.key, aggregator.state());

        match outcome.state() {
            BucketState::Persisted => summary.persisted += 1,
            BucketState::Discarded => summary.discarded += 1,
            _ => summary.skipped += 1,
        }
        pb.inc(1);
    }
    pb.finish_with_message("Buckets processed");

    debug_assert!(!table.is_dirty());
    summary.failed_scenes = aggregator.failed_scenes();
    summary.table_writes = table.writes();
    info!("{}", summary);

    Ok(summary)
}

// -- Tests -------------------------------------------------------------------
