//! Storage layer: DuckDB tables for reference data, usage norms and applications.

mod error;
pub use error::StoreError;

#[cfg(feature = "duckdb")]
mod columns;
#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
mod entities;
#[cfg(feature = "duckdb")]
mod ledger;
#[cfg(feature = "duckdb")]
mod reference;
#[cfg(feature = "duckdb")]
pub mod tables;

#[cfg(feature = "duckdb")]
pub use duck::{DuckStore, read_parquet, write_parquet};
#[cfg(feature = "duckdb")]
pub use ledger::NewApplication;
#[cfg(feature = "duckdb")]
pub use reference::DuckCoefficientBackend;
