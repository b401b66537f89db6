mod aoi;
mod cli;
mod config;
mod download;
mod error;
mod indices;
mod logging;
mod parquet;
mod pipeline;
mod raster;
mod reclass;
mod scene;
mod table;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    let result = match &cli.command {
        Commands::Process(args) => command::process(args).await,
        Commands::Fetch { manifest, data_dir } => command::fetch(manifest, data_dir).await,
        Commands::Indices {
            input_dir,
            output_dir,
            min_size,
        } => command::indices(input_dir, output_dir, *min_size).await,
        Commands::Spans { dir, span_days } => command::spans(dir, *span_days).await,
        Commands::Export {
            table,
            output,
            product,
        } => command::export(table, output.as_ref(), *product).await,
    };

    match result {
        Ok(message) => println!("{}", message),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
