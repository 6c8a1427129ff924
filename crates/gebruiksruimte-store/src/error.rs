use std::path::PathBuf;

use gebruiksruimte_core::{CoreError, NormError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("unsupported source format: {0} (expected .parquet or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("table '{table}' is missing columns: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("no results for query")]
    NoResults,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("usage norm already exists for parcel {parcel_id}, crop {crop_id}, year {year}")]
    DuplicateUsageNorm {
        parcel_id: String,
        crop_id: String,
        year: i32,
    },

    #[error(transparent)]
    Norm(#[from] NormError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "duckdb")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
