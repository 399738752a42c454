//! Error types for the feature pipeline

use thiserror::Error;

/// Main error type for the feature pipeline
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Missing column '{column}' for stock {stock}")]
    MissingColumn { stock: String, column: String },

    #[error("Column '{column}' already computed for stock {stock}")]
    DuplicateColumn { stock: String, column: String },

    #[error("Column '{column}' has {actual} rows, series has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FeatureError>;
