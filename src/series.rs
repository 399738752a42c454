//! Columnar, date-ordered history of a single stock
//!
//! Raw fields are fixed at construction. Stages add derived columns through
//! [`StockSeries::insert_column`], which refuses to overwrite an existing
//! column so earlier outputs are never mutated.

use crate::error::{FeatureError, Result};
use crate::types::{Column, DailyRecord, Price, StockCode, Volume};
use hashbrown::HashMap;

/// One stock's daily history plus the columns derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct StockSeries {
    stock_code: StockCode,
    sector: Option<String>,
    name: Option<String>,
    prices: Vec<Price>,
    volumes: Vec<Option<Volume>>,
    active: Vec<bool>,
    columns: HashMap<String, Column>,
    column_order: Vec<String>,
}

impl StockSeries {
    /// Build from one stock's records in any order
    ///
    /// Records are stably sorted by date; identity labels come from the
    /// earliest record.
    pub fn from_records(mut records: Vec<DailyRecord>) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| FeatureError::DataError("Cannot build a series from zero records".to_string()))?;
        let stock_code = first.stock_code.clone();

        if let Some(other) = records.iter().find(|r| r.stock_code != stock_code) {
            return Err(FeatureError::DataError(format!(
                "Mixed stock codes in one series: {} and {}",
                stock_code, other.stock_code
            )));
        }

        if records.iter().all(|r| !r.price.is_finite()) {
            return Err(FeatureError::MissingColumn {
                stock: stock_code,
                column: "price".to_string(),
            });
        }

        records.sort_by_key(|r| r.date);

        let sector = records[0].sector.clone();
        let name = records[0].name.clone();
        let len = records.len();

        let mut prices = Vec::with_capacity(len);
        let mut volumes = Vec::with_capacity(len);
        let mut active = Vec::with_capacity(len);
        for record in records {
            active.push(record.is_active());
            prices.push(record.price);
            volumes.push(record.volume);
        }

        Ok(Self {
            stock_code,
            sector,
            name,
            prices,
            volumes,
            active,
            columns: HashMap::new(),
            column_order: Vec::new(),
        })
    }

    pub fn stock_code(&self) -> &str {
        &self.stock_code
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn prices(&self) -> &[Price] {
        &self.prices
    }

    pub fn volumes(&self) -> &[Option<Volume>] {
        &self.volumes
    }

    /// Indices of rows with non-null, strictly positive volume
    pub fn active_days(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(|(i, _)| i)
            .collect()
    }

    /// Derived column by name
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    /// Derived column names in the order they were added
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    /// Derived column that a stage cannot run without
    pub fn require_column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name).ok_or_else(|| FeatureError::MissingColumn {
            stock: self.stock_code.clone(),
            column: name.to_string(),
        })
    }

    /// Add a derived column
    pub fn insert_column(&mut self, name: impl Into<String>, values: Column) -> Result<()> {
        let name = name.into();

        if values.len() != self.len() {
            return Err(FeatureError::LengthMismatch {
                column: name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        if self.columns.contains_key(&name) {
            return Err(FeatureError::DuplicateColumn {
                stock: self.stock_code.clone(),
                column: name,
            });
        }

        self.column_order.push(name.clone());
        self.columns.insert(name, values);
        Ok(())
    }

    /// Value of a column on the most recent row
    ///
    /// Outer `None`: column absent. Inner `None`: value undefined.
    pub fn last_value(&self, name: &str) -> Option<Option<f64>> {
        self.column(name).map(|c| c.last().copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, price: f64, volume: Option<f64>) -> DailyRecord {
        DailyRecord::new("KCB", NaiveDate::from_ymd_opt(2023, 3, day).unwrap(), price, volume)
    }

    #[test]
    fn test_records_sorted_by_date() {
        let records = vec![
            record(3, 30.0, Some(10.0)).with_labels(Some("Banking".into()), Some("Late".into())),
            record(1, 10.0, Some(10.0)).with_labels(Some("Banking".into()), Some("KCB Group".into())),
            record(2, 20.0, None),
        ];

        let series = StockSeries::from_records(records).unwrap();

        assert_eq!(series.prices(), &[10.0, 20.0, 30.0]);
        assert_eq!(series.volumes(), &[Some(10.0), None, Some(10.0)]);
        assert_eq!(series.name(), Some("KCB Group"));
        assert_eq!(series.sector(), Some("Banking"));
        assert_eq!(series.active_days(), vec![0, 2]);
    }

    #[test]
    fn test_insert_column_rejects_overwrite() {
        let mut series = StockSeries::from_records(vec![record(1, 10.0, None), record(2, 11.0, None)]).unwrap();

        series.insert_column("daily_return", vec![None, Some(0.1)]).unwrap();
        let err = series.insert_column("daily_return", vec![None, None]).unwrap_err();

        assert!(matches!(err, FeatureError::DuplicateColumn { .. }));
        assert_eq!(series.column("daily_return").unwrap()[1], Some(0.1));
        assert_eq!(series.column_names(), &["daily_return".to_string()]);
    }

    #[test]
    fn test_insert_column_length_mismatch() {
        let mut series = StockSeries::from_records(vec![record(1, 10.0, None)]).unwrap();
        let err = series.insert_column("rsi", vec![None, None]).unwrap_err();

        assert!(matches!(err, FeatureError::LengthMismatch { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_last_value() {
        let mut series = StockSeries::from_records(vec![record(1, 10.0, None), record(2, 11.0, None)]).unwrap();
        series.insert_column("macd", vec![Some(1.0), None]).unwrap();

        assert_eq!(series.last_value("macd"), Some(None));
        assert_eq!(series.last_value("rsi"), None);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            StockSeries::from_records(Vec::new()),
            Err(FeatureError::DataError(_))
        ));

        let mut other = record(2, 10.0, None);
        other.stock_code = "EQTY".to_string();
        assert!(matches!(
            StockSeries::from_records(vec![record(1, 10.0, None), other]),
            Err(FeatureError::DataError(_))
        ));

        assert!(matches!(
            StockSeries::from_records(vec![record(1, f64::NAN, Some(5.0))]),
            Err(FeatureError::MissingColumn { .. })
        ));
    }
}
