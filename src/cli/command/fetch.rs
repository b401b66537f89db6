//! Download the archives of a query manifest into the data directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::info;

use crate::{cli::create_spinner, download::download_with_progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub url: String,
}

impl ManifestEntry {
    /// The last `;`-separated field of a line is the download URL.
    fn from_line(line: &str) -> Option<Self> {
        let url = line.split(';').last()?.trim();
        if url.is_empty() {
            return None;
        }

        let segment = url.trim_end_matches('/').rsplit('/').next()?;
        let id = segment.split('.').next().unwrap_or(segment);
        if id.is_empty() {
            return None;
        }

        Some(ManifestEntry {
            id: id.to_string(),
            url: url.to_string(),
        })
    }

    fn file_name(&self) -> String {
        format!("{}.zip", self.id)
    }
}

pub fn read_manifest(manifest: &Path) -> Result<Vec<ManifestEntry>> {
    let text = fs::read_to_string(manifest)
        .with_context(|| format!("Could not read manifest {}", manifest.display()))?;

    Ok(text.lines().filter_map(ManifestEntry::from_line).collect())
}

/// Entries without an archive in `data_dir` yet.
pub fn missing_entries(entries: Vec<ManifestEntry>, data_dir: &Path) -> Vec<ManifestEntry> {
    entries
        .into_iter()
        .filter(|entry| !data_dir.join(entry.file_name()).exists())
        .collect()
}

pub async fn fetch(manifest: &Path, data_dir: &Path) -> Result<String> {
    let entries = read_manifest(manifest)?;
    let total = entries.len();
    let to_load = missing_entries(entries, data_dir);

    info!(
        "Found {} existing files and {} new files to load",
        total - to_load.len(),
        to_load.len()
    );

    fs::create_dir_all(data_dir)?;
    let tmp_dir = TempDir::new()?;

    for entry in &to_load {
        let file_path = download_archive(entry, tmp_dir.path()).await?;
        move_into(&file_path, &data_dir.join(entry.file_name()))?;
    }

    Ok(format!(
        "{} archives downloaded to `{}`",
        to_load.len(),
        data_dir.display()
    ))
}

async fn download_archive(entry: &ManifestEntry, temp_dir: &Path) -> Result<PathBuf> {
    let file_path = temp_dir.join(entry.file_name());

    let bar = create_spinner(format!("Downloading {}...", entry.id));
    download_with_progress(&entry.url, &file_path, &bar).await?;
    bar.finish_with_message(format!("{} downloaded", entry.id));

    Ok(file_path)
}

fn move_into(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        // temp and data dir can be on different filesystems
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_manifest_line() {
        let line = "FSC;32TPT;2018-01-04;https://example.org/download/FSC_20180104T102411_S2A_T32TPT_V100_1.zip\n";
        let entry = ManifestEntry::from_line(line).unwrap();

        assert_eq!(entry.id, "FSC_20180104T102411_S2A_T32TPT_V100_1");
        assert_eq!(entry.file_name(), "FSC_20180104T102411_S2A_T32TPT_V100_1.zip");
    }

    #[test]
    fn should_skip_blank_lines() {
        assert!(ManifestEntry::from_line("").is_none());
        assert!(ManifestEntry::from_line("a;b; ").is_none());
    }

    #[test]
    fn should_keep_only_missing_archives() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("SWS_a.zip"), b"").unwrap();
        let manifest = dir.path().join("result_file.txt");
        fs::write(
            &manifest,
            "x;https://host/SWS_a.zip\nx;https://host/SWS_b.zip\n\n",
        )
        .unwrap();

        let entries = read_manifest(&manifest).unwrap();
        let missing = missing_entries(entries, dir.path());

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "SWS_b");
    }
}
