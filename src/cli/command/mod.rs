pub mod export;
pub mod fetch;
pub mod indices;
pub mod process;
pub mod spans;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
pub use export::export;
pub use fetch::fetch;
pub use indices::indices;
pub use process::process;
pub use spans::spans;

use crate::scene::Product;

pub fn make_parquet_file_name(product: Product) -> Result<PathBuf> {
    let today = Local::now();
    let file_name = format!(
        "snowcover-{}-{}-{:02}-{:02}.parquet",
        product,
        today.year(),
        today.month(),
        today.day()
    );

    let home = dirs::home_dir().context("Could not find home directory")?;

    Ok(home.join(file_name))
}

// -- Tests -------------------------------------------------------------------
