//! # stock_features
//!
//! Per-stock risk/return feature extraction for daily equity prices.
//!
//! Raw `(stock, date, price, volume)` rows are grouped per stock, run through a
//! chain of rolling-window stages (returns, volatility, risk, technical
//! indicators, liquidity, momentum, drawdown) and collapsed into one
//! [`StockFeatureVector`](features::StockFeatureVector) per stock. Stocks with
//! fewer than 20 active trading days are excluded.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stock_features::prelude::*;
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let universe = DailyCsvReader::new().load_universe(Path::new("prices.csv"))?;
//!     let pipeline = Pipeline::with_default_stages(PipelineConfig::default())?;
//!     let output = pipeline.run_universe(universe)?;
//!
//!     FeatureTableWriter::new(OutputFormat::Csv)
//!         .write_path(Path::new("features.csv"), &output.features)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod series;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::config::{MovingAverageSpec, PipelineConfig};
    pub use crate::data::{CsvFormat, DailyCsvReader, FeatureTableWriter, OutputFormat};
    pub use crate::error::{FeatureError, Result};
    pub use crate::features::{FeatureTable, StockFeatureVector, REQUIRED_FEATURE_COLUMNS};
    pub use crate::pipeline::{Pipeline, PipelineOutput, RunSummary, Stage, StageOutput};
    pub use crate::series::StockSeries;
    pub use crate::types::*;
}
