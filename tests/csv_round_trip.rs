//! Raw CSV in, feature table out, schema check back in

use std::fs::File;
use std::io::Write;
use stock_features::features::{FeatureTable, REQUIRED_FEATURE_COLUMNS};
use stock_features::prelude::*;
use tempfile::{NamedTempFile, TempDir};

fn write_prices(stocks: &[(&str, &str, usize, f64)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Stock_code,Name,Day Price,Volume,Sector").unwrap();
    for &(code, sector, days, base) in stocks {
        for i in 0..days {
            let date = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(i as i64);
            let price = base + ((i as f64) * 0.4).sin();
            writeln!(
                file,
                "{},{},{} Plc,{:.2},{},{}",
                date.format("%Y-%m-%d"),
                code,
                code,
                price,
                1000 + i * 10,
                sector
            )
            .unwrap();
        }
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_build_and_check_csv() {
    let input = write_prices(&[("SCOM", "Telecommunication", 60, 20.0), ("NEW", "Banking", 10, 5.0)]);
    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("features.csv");

    let universe = DailyCsvReader::new().load_universe(input.path()).unwrap();
    assert_eq!(universe.len(), 2);

    let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
    let output = pipeline.run_universe(universe).unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output.summary.excluded, vec!["NEW".to_string()]);

    FeatureTableWriter::new(OutputFormat::from_path(&output_path))
        .write_path(&output_path, &output.features)
        .unwrap();

    let table = FeatureTable::from_csv_reader(File::open(&output_path).unwrap()).unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.missing_columns(&REQUIRED_FEATURE_COLUMNS).is_empty());
    assert_eq!(&table.columns()[..3], &["stock_code", "sector", "name"]);
    assert!(table.sharpe_out_of_bounds(5.0).is_empty());
}

#[test]
fn test_build_json() {
    let input = write_prices(&[("EQTY", "Banking", 45, 40.0)]);
    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("features.json");

    let universe = DailyCsvReader::new().load_universe(input.path()).unwrap();
    let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
    let output = pipeline.run_universe(universe).unwrap();

    FeatureTableWriter::new(OutputFormat::from_path(&output_path))
        .write_path(&output_path, &output.features)
        .unwrap();

    let parsed: Vec<StockFeatureVector> = serde_json::from_reader(File::open(&output_path).unwrap()).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].stock_code, "EQTY");
    assert_eq!(parsed[0].sector.as_deref(), Some("Banking"));
    assert_eq!(parsed[0].name.as_deref(), Some("EQTY Plc"));
    assert_eq!(parsed[0].momentum_90d, None);
}

#[test]
fn test_config_file_drives_pipeline() {
    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(config_file, "min_active_days = 5\nreturn_consistency = true").unwrap();
    config_file.flush().unwrap();

    let config = PipelineConfig::from_toml_file(config_file.path()).unwrap();
    assert_eq!(config.min_active_days, 5);
    assert_eq!(config.sharpe_bound, 5.0);

    let input = write_prices(&[("NEW", "Banking", 10, 5.0)]);
    let universe = DailyCsvReader::new().load_universe(input.path()).unwrap();
    let output = Pipeline::with_default_stages(config).unwrap().run_universe(universe).unwrap();

    assert_eq!(output.len(), 1);
    let consistency = output.features[0].return_consistency.unwrap();
    assert!((0.0..=1.0).contains(&consistency));
}
