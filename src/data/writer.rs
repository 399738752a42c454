//! Feature table output

use crate::error::{FeatureError, Result};
use crate::features::{table_columns, StockFeatureVector};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output encoding of the feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// Guess from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// Writes one row per stock
#[derive(Debug, Clone, Default)]
pub struct FeatureTableWriter {
    format: OutputFormat,
}

impl FeatureTableWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn write_path(&self, path: &Path, features: &[StockFeatureVector]) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.write(&mut out, features)?;
        out.flush()?;
        Ok(())
    }

    pub fn write<W: Write>(&self, out: W, features: &[StockFeatureVector]) -> Result<()> {
        match self.format {
            OutputFormat::Csv => write_csv(out, features),
            OutputFormat::Json => write_json(out, features),
        }
    }
}

/// CSV with identity columns first; undefined values are empty cells
pub fn write_csv<W: Write>(out: W, features: &[StockFeatureVector]) -> Result<()> {
    let columns = table_columns(features);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(&columns)?;

    for vector in features {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            let cell = match column.as_str() {
                "stock_code" => vector.stock_code.clone(),
                "sector" => vector.sector.clone().unwrap_or_default(),
                "name" => vector.name.clone().unwrap_or_default(),
                other => match vector.value(other) {
                    Some(Some(v)) => v.to_string(),
                    Some(None) => String::new(),
                    None => {
                        return Err(FeatureError::DataError(format!(
                            "Unknown feature column '{}'",
                            other
                        )))
                    }
                },
            };
            row.push(cell);
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Pretty JSON array of feature vectors
pub fn write_json<W: Write>(out: W, features: &[StockFeatureVector]) -> Result<()> {
    serde_json::to_writer_pretty(out, features)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureTable, REQUIRED_FEATURE_COLUMNS};

    fn vector(code: &str) -> StockFeatureVector {
        StockFeatureVector {
            stock_code: code.to_string(),
            sector: Some("Banking".to_string()),
            name: Some("Test, Ltd".to_string()),
            volatility_mean: Some(0.02),
            volatility_max: Some(0.04),
            downside_deviation: Some(0.01),
            var_95: Some(-0.03),
            max_drawdown: Some(-0.1),
            mean_return: Some(0.001),
            std_return: Some(0.015),
            return_skew: Some(0.2),
            return_kurtosis: Some(0.5),
            sharpe_ratio: Some(1.1),
            rsi_mean: Some(55.0),
            bb_width_mean: Some(3.0),
            macd_volatility: Some(0.2),
            avg_volume: Some(5000.0),
            volume_volatility: Some(250.0),
            amihud_illiquidity: Some(2e-6),
            trading_frequency: 0.95,
            momentum_30d: Some(0.04),
            momentum_90d: None,
            trend_strength: Some(0.02),
            avg_recovery_days: None,
            return_consistency: None,
            current_price: 12.5,
        }
    }

    #[test]
    fn test_csv_output_schema() {
        let features = vec![vector("A"), vector("B")];
        let mut buf = Vec::new();
        write_csv(&mut buf, &features).unwrap();

        let table = FeatureTable::from_csv_reader(buf.as_slice()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.missing_columns(&REQUIRED_FEATURE_COLUMNS).is_empty());
        assert!(!table.columns().iter().any(|c| c == "avg_recovery_days"));
        assert_eq!(table.sharpe_range(), Some((1.1, 1.1)));
    }

    #[test]
    fn test_csv_empty_cell_for_undefined() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[vector("A")]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut lines = text.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let idx = header.iter().position(|h| *h == "momentum_90d").unwrap();
        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let row = rdr.records().next().unwrap().unwrap();

        assert_eq!(&row[idx], "");
        assert_eq!(&row[2], "Test, Ltd");
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        FeatureTableWriter::new(OutputFormat::Json)
            .write(&mut buf, &[vector("A")])
            .unwrap();

        let parsed: Vec<StockFeatureVector> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, vec![vector("A")]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out/features.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("features.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("features")), OutputFormat::Csv);
    }
}
