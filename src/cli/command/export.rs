//! Convert the results table to parquet.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::warn;

use crate::{parquet, scene::Product, table::ResultTable};

use super::make_parquet_file_name;

pub async fn export(table: &Path, output: Option<&PathBuf>, product: Product) -> Result<String> {
    if !table.exists() {
        bail!("Results table {} does not exist", table.display());
    }

    let table = ResultTable::load_or_default(table)?;
    if table.is_empty() {
        warn!("Results table has no rows");
    }
    let rows: Vec<_> = table.rows().copied().collect();

    let parquet_file_name = match output {
        Some(path) => path.clone(),
        None => make_parquet_file_name(product)?,
    };
    parquet::save_results(&rows, &parquet_file_name)?;

    Ok(parquet_file_name.to_string_lossy().to_string())
}

// -- Tests -------------------------------------------------------------------
