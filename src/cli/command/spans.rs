//! Group PlanetScope scene dates into spans.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::warn;

use crate::scene::{date_prefix, date_spans};

pub async fn spans(dir: &Path, span_days: i64) -> Result<String> {
    let dates = dates_in_dir(dir)?;
    let spans = date_spans(dates, span_days);

    let lines: Vec<String> = spans
        .iter()
        .enumerate()
        .map(|(i, (first, last))| format!("Span {}: [{}, {}]", i + 1, first, last))
        .collect();

    Ok(lines.join("\n"))
}

fn dates_in_dir(dir: &Path) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Could not read {}", dir.display()))? {
        let file_name = entry?.file_name().to_string_lossy().to_string();
        match date_prefix(&file_name) {
            Some(date) => dates.push(date),
            None => warn!("Filename {} does not have the expected date format", file_name),
        }
    }

    Ok(dates)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn should_print_spans_of_directory() {
        let dir = TempDir::new().unwrap();
        for name in [
            "20230301_101233_AnalyticMS_SR_clip.tif",
            "20230305_101233_AnalyticMS_SR_clip.tif",
            "20230320_100912_AnalyticMS_SR_clip.tif",
            "metadata.json",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let output = spans(dir.path(), 7).await.unwrap();

        assert_eq!(
            output,
            "Span 1: [2023-03-01, 2023-03-05]\nSpan 2: [2023-03-20, 2023-03-20]"
        );
    }
}
