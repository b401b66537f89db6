//! Run the daily aggregation pipeline.

use anyhow::Result;

use crate::{cli::ProcessArgs, config::Config, pipeline};

pub async fn process(args: &ProcessArgs) -> Result<String> {
    let config = Config::from_args(args)?;
    let summary = pipeline::run(&config)?;

    Ok(format!(
        "{}; results in `{}`",
        summary,
        config.table_path.display()
    ))
}
