//! Reading the raw daily table and writing the feature table

pub mod reader;
pub mod writer;

pub use reader::{CsvFormat, DailyCsvReader};
pub use writer::{write_csv, write_json, FeatureTableWriter, OutputFormat};
