//! Core types and constants

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading date (daily bars carry no time component)
pub type TradeDate = NaiveDate;

/// Stock identifier as it appears in the source table
pub type StockCode = String;

/// Price type (using f64 for precision)
pub type Price = f64;

/// Traded volume
pub type Volume = f64;

/// A derived per-day column; `None` marks an undefined value
pub type Column = Vec<Option<f64>>;

/// One stock-day observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub stock_code: StockCode,
    pub date: TradeDate,
    pub price: Price,
    pub volume: Option<Volume>,
    pub sector: Option<String>,
    pub name: Option<String>,
}

impl DailyRecord {
    /// Create a record without sector/name labels
    pub fn new(stock_code: impl Into<StockCode>, date: TradeDate, price: Price, volume: Option<Volume>) -> Self {
        Self {
            stock_code: stock_code.into(),
            date,
            price,
            volume,
            sector: None,
            name: None,
        }
    }

    /// Attach sector and name labels
    pub fn with_labels(mut self, sector: Option<String>, name: Option<String>) -> Self {
        self.sector = sector;
        self.name = name;
        self
    }

    /// A day with non-null, strictly positive volume
    pub fn is_active(&self) -> bool {
        matches!(self.volume, Some(v) if v > 0.0)
    }
}
