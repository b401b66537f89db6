//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod results;

pub use results::save_results;
