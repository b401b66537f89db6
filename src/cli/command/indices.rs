//! Compute spectral index rasters from PlanetScope scenes.

use std::path::Path;

use anyhow::{bail, Result};

use crate::{
    cli::create_spinner,
    indices::{find_scenes, process_scenes, SCENE_SUFFIX},
};

pub async fn indices(input_dir: &Path, output_dir: &Path, min_size: usize) -> Result<String> {
    let scenes = find_scenes(input_dir)?;
    if scenes.is_empty() {
        bail!("No *{} files in {}", SCENE_SUFFIX, input_dir.display());
    }

    let bar = create_spinner(format!("Calculating indices for {} scenes...", scenes.len()));
    let report = process_scenes(&scenes, output_dir, min_size)?;
    bar.finish_with_message("Indices calculated");

    Ok(format!(
        "{} of {} scenes used, {} rasters written ({} already present) in `{}`",
        report.used,
        report.scenes,
        report.written,
        report.existing,
        output_dir.display()
    ))
}
