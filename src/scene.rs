//! Discovers scene archives and groups them into day buckets.
//!
//! Archive names follow `<PRODUCT>_<YYYYMMDDTHHMMSS>_<platform>_<tile>_<version>`,
//! e.g. `SWS_20180101T170648_S1A_T32TPT_V101_1.zip`.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use clap::ValueEnum;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
const ARCHIVE_EXTENSIONS: [&str; 3] = [".zip", ".tar.gz", ".tgz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Product {
    /// Sentinel-1 wet snow
    Sws,
    /// Sentinel-2 fractional snow cover
    Fsc,
}

impl Product {
    /// File name prefix shared by every archive of this product.
    pub fn archive_prefix(&self) -> &'static str {
        match self {
            Product::Sws => "SWS",
            Product::Fsc => "FSC",
        }
    }

    /// Suffix of the raster member inside each archive.
    pub fn member_suffix(&self) -> &'static str {
        match self {
            Product::Sws => "WSM",
            Product::Fsc => "FSCOG",
        }
    }

    pub fn default_output_prefix(&self) -> &'static str {
        match self {
            Product::Sws => "SWS",
            Product::Fsc => "FSC_HOPI",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.archive_prefix().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub name: String,
    pub tile: String,
    pub timestamp: NaiveDateTime,
    pub archive: PathBuf,
    pub product: Product,
}

impl Scene {
    /// Parses a scene from its archive path.
    pub fn from_archive(archive: &Path, product: Product) -> Result<Self> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Archive path has no file name: {}", archive.display()))?;

        let name = strip_archive_extension(file_name)
            .with_context(|| format!("Not a scene archive: {}", file_name))?;

        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 4 {
            bail!("Scene name {} has too few fields", name);
        }

        let timestamp = NaiveDateTime::parse_from_str(parts[1], TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid acquisition time in {}", name))?;

        Ok(Scene {
            name: name.to_string(),
            tile: parts[3].to_string(),
            timestamp,
            archive: archive.to_path_buf(),
            product,
        })
    }

    /// Path of the raster inside the archive.
    pub fn member_name(&self) -> String {
        format!(
            "{0}/{0}_{1}.tif",
            self.name,
            self.product.member_suffix()
        )
    }
}

fn strip_archive_extension(file_name: &str) -> Option<&str> {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
}

/// Lists the scene archives in `dir`, sorted by acquisition time.
///
/// An archive of another product in the directory is an error. Archives
/// whose names cannot be parsed are skipped with a warning.
pub fn discover_scenes(dir: &Path, product: Product) -> Result<Vec<Scene>> {
    let mut scenes = Vec::new();

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Could not read data directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if strip_archive_extension(file_name).is_none() {
            continue;
        }
        if !file_name.starts_with(product.archive_prefix()) {
            bail!(
                "{} does not hold only {} archives, found {}",
                dir.display(),
                product.archive_prefix(),
                file_name
            );
        }

        match Scene::from_archive(&path, product) {
            Ok(scene) => scenes.push(scene),
            Err(e) => warn!("Skipping {}: {:#}", file_name, e),
        }
    }

    scenes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.name.cmp(&b.name)));
    debug!("Found {} {} scenes in {}", scenes.len(), product, dir.display());

    Ok(scenes)
}

/// Rounds to the nearest multiple of `granularity`, ties to even.
pub fn round_timestamp(timestamp: NaiveDateTime, granularity: TimeDelta) -> NaiveDateTime {
    let step = granularity.num_seconds();
    if step <= 0 {
        return timestamp;
    }

    let secs = timestamp.and_utc().timestamp();
    let mut quotient = secs.div_euclid(step);
    let remainder = secs.rem_euclid(step);

    if 2 * remainder > step || (2 * remainder == step && quotient % 2 != 0) {
        quotient += 1;
    }

    DateTime::from_timestamp(quotient * step, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(timestamp)
}

#[derive(Debug, Clone, PartialEq)]
/// Scenes sharing one rounded acquisition time.
pub struct DayBucket {
    pub key: NaiveDateTime,
    pub scenes: Vec<Scene>,
}

impl DayBucket {
    /// Mean acquisition time of the bucket's scenes.
    pub fn mean_timestamp(&self) -> NaiveDateTime {
        let Some(first) = self.scenes.iter().map(|s| s.timestamp).min() else {
            return self.key;
        };

        let total: i64 = self
            .scenes
            .iter()
            .map(|s| (s.timestamp - first).num_milliseconds())
            .sum();
        let mean = total / self.scenes.len() as i64;

        first + TimeDelta::milliseconds(mean)
    }

    /// `<prefix>_<YYYY_MM_DD>_<HH_MM>.tif`, from the mean timestamp.
    pub fn output_file_name(&self, prefix: &str) -> String {
        format!(
            "{}_{}.tif",
            prefix,
            self.mean_timestamp().format("%Y_%m_%d_%H_%M")
        )
    }
}

/// Groups scenes by their rounded timestamp, in time order.
pub fn group_into_buckets(scenes: Vec<Scene>, granularity: TimeDelta) -> Vec<DayBucket> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<Scene>> = BTreeMap::new();
    for scene in scenes {
        let key = round_timestamp(scene.timestamp, granularity);
        groups.entry(key).or_default().push(scene);
    }

    groups
        .into_iter()
        .map(|(key, scenes)| DayBucket { key, scenes })
        .collect()
}

/// Date from a `YYYYMMDD_...` file name, as used by PlanetScope scenes.
pub fn date_prefix(file_name: &str) -> Option<NaiveDate> {
    let prefix = file_name.split('_').next()?;
    NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
}

/// Splits sorted dates into spans whose last date lies at most `span_days`
/// after their first.
pub fn date_spans(mut dates: Vec<NaiveDate>, span_days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    dates.sort();
    dates.dedup();

    let mut spans = Vec::new();
    let mut dates = dates.into_iter();
    let Some(mut start) = dates.next() else {
        return spans;
    };
    let mut end = start;

    for date in dates {
        if (date - start).num_days() > span_days {
            spans.push((start, end));
            start = date;
        }
        end = date;
    }
    spans.push((start, end));

    spans
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::TempDir;

    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn scene(name: &str) -> Scene {
        Scene::from_archive(Path::new(&format!("/data/{}.zip", name)), Product::Sws).unwrap()
    }

    #[test]
    fn should_parse_scene_from_archive_name() {
        let scene = scene("SWS_20180101T170648_S1A_T32TPT_V101_1");

        assert_eq!(scene.tile, "T32TPT");
        assert_eq!(scene.timestamp, at("2018-01-01 17:06:48"));
        assert_eq!(
            scene.member_name(),
            "SWS_20180101T170648_S1A_T32TPT_V101_1/SWS_20180101T170648_S1A_T32TPT_V101_1_WSM.tif"
        );
    }

    #[test]
    fn should_accept_tarballs() {
        let scene = Scene::from_archive(
            Path::new("FSC_20200302T101021_S2B_T32TPT_V102_1.tar.gz"),
            Product::Fsc,
        )
        .unwrap();

        assert_eq!(scene.name, "FSC_20200302T101021_S2B_T32TPT_V102_1");
        assert!(scene.member_name().ends_with("_FSCOG.tif"));
    }

    #[test]
    fn should_reject_malformed_names() {
        assert!(Scene::from_archive(Path::new("SWS_garbage.zip"), Product::Sws).is_err());
        assert!(Scene::from_archive(Path::new("SWS_2018_S1A_T32TPT.zip"), Product::Sws).is_err());
        assert!(Scene::from_archive(Path::new("notes.txt"), Product::Sws).is_err());
    }

    #[test]
    fn should_round_to_nearest_hour() {
        let hour = TimeDelta::hours(1);

        assert_eq!(round_timestamp(at("2018-01-01 17:06:48"), hour), at("2018-01-01 17:00:00"));
        assert_eq!(round_timestamp(at("2018-01-01 17:31:00"), hour), at("2018-01-01 18:00:00"));
        // crosses midnight into the next calendar day
        assert_eq!(round_timestamp(at("2018-01-01 23:45:00"), hour), at("2018-01-02 00:00:00"));
    }

    #[test]
    fn should_round_ties_to_even() {
        let hour = TimeDelta::hours(1);

        assert_eq!(round_timestamp(at("2018-01-01 16:30:00"), hour), at("2018-01-01 16:00:00"));
        assert_eq!(round_timestamp(at("2018-01-01 17:30:00"), hour), at("2018-01-01 18:00:00"));
    }

    #[test]
    fn should_group_scenes_into_buckets() {
        let scenes = vec![
            scene("SWS_20180101T170648_S1A_T32TPT_V101_1"),
            scene("SWS_20180101T171113_S1A_T32TQT_V101_1"),
            scene("SWS_20180103T053012_S1B_T32TPT_V101_1"),
        ];

        let buckets = group_into_buckets(scenes, TimeDelta::hours(1));

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, at("2018-01-01 17:00:00"));
        assert_eq!(buckets[0].scenes.len(), 2);
        assert_eq!(buckets[1].scenes.len(), 1);
    }

    #[test]
    fn should_name_output_from_mean_timestamp() {
        let bucket = DayBucket {
            key: at("2018-01-01 17:00:00"),
            scenes: vec![
                scene("SWS_20180101T170600_S1A_T32TPT_V101_1"),
                scene("SWS_20180101T171200_S1A_T32TQT_V101_1"),
            ],
        };

        assert_eq!(bucket.mean_timestamp(), at("2018-01-01 17:09:00"));
        assert_eq!(bucket.output_file_name("SWS"), "SWS_2018_01_01_17_09.tif");
    }

    #[test]
    fn should_discover_archives_in_time_order() {
        let dir = TempDir::new().unwrap();
        for name in [
            "SWS_20180103T053012_S1B_T32TPT_V101_1.zip",
            "SWS_20180101T170648_S1A_T32TPT_V101_1.zip",
            "SWS_broken.zip",
            "readme.txt",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }

        let scenes = discover_scenes(dir.path(), Product::Sws).unwrap();

        assert_eq!(scenes.len(), 2);
        assert!(scenes[0].timestamp < scenes[1].timestamp);
    }

    #[test]
    fn should_refuse_mixed_products() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("SWS_20180101T170648_S1A_T32TPT_V101_1.zip")).unwrap();
        File::create(dir.path().join("FSC_20180101T101021_S2B_T32TPT_V102_1.zip")).unwrap();

        assert!(discover_scenes(dir.path(), Product::Sws).is_err());
    }

    #[test]
    fn should_parse_date_prefix() {
        assert_eq!(
            date_prefix("20230412_101233_24_2212_3B_AnalyticMS_SR_clip.tif"),
            NaiveDate::from_ymd_opt(2023, 4, 12)
        );
        assert_eq!(date_prefix("udm2_clip.tif"), None);
    }

    #[test]
    fn should_split_dates_into_spans() {
        let d = |day| NaiveDate::from_ymd_opt(2023, 4, day).unwrap();
        let spans = date_spans(vec![d(10), d(1), d(8), d(3), d(9), d(20)], 7);

        assert_eq!(spans, vec![(d(1), d(8)), (d(9), d(10)), (d(20), d(20))]);
        assert!(date_spans(Vec::new(), 7).is_empty());
    }
}
