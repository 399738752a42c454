//! Raw daily CSV ingestion

use crate::error::{FeatureError, Result};
use crate::pipeline::group_records;
use crate::series::StockSeries;
use crate::types::{DailyRecord, TradeDate};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column layout of a raw daily table
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFormat {
    /// Stock code column name
    pub code_column: String,
    /// Trading date column name
    pub date_column: String,
    /// Closing price column name
    pub price_column: String,
    /// Volume column name; rows without it get null volume
    pub volume_column: String,
    /// Optional sector label column
    pub sector_column: String,
    /// Optional display name column
    pub name_column: String,
    /// Primary date format (e.g., "%Y-%m-%d")
    pub date_format: String,
    /// Formats tried when the primary one fails
    pub fallback_date_formats: Vec<String>,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            code_column: "Stock_code".to_string(),
            date_column: "Date".to_string(),
            price_column: "Day Price".to_string(),
            volume_column: "Volume".to_string(),
            sector_column: "Sector".to_string(),
            name_column: "Name".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            fallback_date_formats: vec!["%d-%b-%Y".to_string(), "%m/%d/%Y".to_string()],
            delimiter: b',',
        }
    }
}

struct ColumnIndex {
    code: usize,
    date: usize,
    price: usize,
    volume: Option<usize>,
    sector: Option<usize>,
    name: Option<usize>,
}

/// Reader for the raw `(stock, date, price, volume, sector, name)` table
#[derive(Debug, Clone, Default)]
pub struct DailyCsvReader {
    format: CsvFormat,
}

impl DailyCsvReader {
    /// Create new reader with the default layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom layout
    pub fn with_format(format: CsvFormat) -> Self {
        Self { format }
    }

    /// Read every row of a CSV file
    pub fn read_path(&self, path: &Path) -> Result<Vec<DailyRecord>> {
        let file = File::open(path)
            .map_err(|e| FeatureError::DataError(format!("Failed to open {}: {}", path.display(), e)))?;
        self.read(file)
    }

    /// Read every row from any CSV source
    pub fn read<R: Read>(&self, source: R) -> Result<Vec<DailyRecord>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.format.delimiter)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers = rdr.headers()?.clone();
        let index = self.index_columns(&headers)?;

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            // header is line 1
            records.push(self.parse_record(&record, &index, row + 2)?);
        }

        log::info!("Read {} daily rows", records.len());
        Ok(records)
    }

    /// Read a CSV file and build one series per stock, in first-seen order
    pub fn load_universe(&self, path: &Path) -> Result<Vec<StockSeries>> {
        let records = self.read_path(path)?;
        group_records(records)
    }

    fn index_columns(&self, headers: &StringRecord) -> Result<ColumnIndex> {
        let price = find_column(headers, &self.format.price_column).ok_or_else(|| {
            FeatureError::MissingColumn {
                stock: "*".to_string(),
                column: self.format.price_column.clone(),
            }
        })?;
        let volume = find_column(headers, &self.format.volume_column);
        if volume.is_none() {
            log::warn!(
                "Column '{}' not found; every row gets null volume",
                self.format.volume_column
            );
        }

        Ok(ColumnIndex {
            code: require_column(headers, &self.format.code_column)?,
            date: require_column(headers, &self.format.date_column)?,
            price,
            volume,
            sector: find_column(headers, &self.format.sector_column),
            name: find_column(headers, &self.format.name_column),
        })
    }

    fn parse_record(&self, record: &StringRecord, index: &ColumnIndex, line: usize) -> Result<DailyRecord> {
        let code = record
            .get(index.code)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FeatureError::DataError(format!("Missing stock code on line {}", line)))?;

        let date_str = record
            .get(index.date)
            .ok_or_else(|| FeatureError::DataError(format!("Missing date on line {}", line)))?;
        let date = self.parse_date(date_str).ok_or_else(|| {
            FeatureError::DataError(format!("Invalid date '{}' on line {}", date_str, line))
        })?;

        let price_str = record.get(index.price).unwrap_or("");
        let price = price_str
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                FeatureError::DataError(format!(
                    "Invalid price '{}' for {} on line {}",
                    price_str, code, line
                ))
            })?;

        let volume = match index.volume.and_then(|i| record.get(i)) {
            None | Some("") => None,
            Some(cell) => match parse_volume(cell) {
                Some(v) => Some(v),
                None => {
                    log::warn!("Unparsable volume '{}' for {} on line {}; treated as null", cell, code, line);
                    None
                }
            },
        };

        Ok(DailyRecord::new(code, date, price, volume)
            .with_labels(optional_cell(record, index.sector), optional_cell(record, index.name)))
    }

    fn parse_date(&self, value: &str) -> Option<TradeDate> {
        std::iter::once(&self.format.date_format)
            .chain(&self.format.fallback_date_formats)
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    }
}

/// Find column index by name
fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(headers: &StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name)
        .ok_or_else(|| FeatureError::DataError(format!("Column '{}' not found", name)))
}

fn optional_cell(record: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Volumes are often exported with thousands separators
fn parse_volume(cell: &str) -> Option<f64> {
    let cleaned: String = cell.chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
