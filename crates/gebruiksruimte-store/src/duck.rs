//! DuckDB storage for reference tables, entities, usage norms and applications.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use crate::StoreError;
use crate::tables::{self, cast_projection, column_list, create_table_sql, missing_required};

/// DuckDB store for one farm administration.
///
/// Reference tables (norms, working coefficients) are administrator data,
/// loaded from Parquet or CSV. Entity tables hold user-owned rows and every
/// read of them is scoped to a user id.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for file-backed storage that survives across process restarts.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database with all managed tables created.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Managed tables are created when missing; existing rows are kept.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        for (name, schema, constraints) in tables::managed() {
            self.conn
                .execute_batch(&create_table_sql(name, &schema, constraints))?;
        }
        debug!("managed tables ready");
        Ok(())
    }

    /// Whether a table exists in the main schema.
    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether the crop norm table has been loaded.
    pub fn has_reference_data(&self) -> bool {
        self.count_table(gebruiksruimte_core::reference::CROP_NORMS)
            .is_ok_and(|n| n > 0)
    }

    // ── Loading ──

    /// Load a Parquet or CSV file into `table`, checked against `expected`.
    ///
    /// Reference tables are replaced wholesale. Entity tables are merged by id.
    /// Optional columns absent from the file load as NULL.
    pub fn load_table(&self, table: &str, expected: &Schema, path: &Path) -> Result<usize, StoreError> {
        if table == tables::PARCELS {
            return self.load_parcels(path);
        }
        let (source, projection) = self.open_source(table, expected, path)?;
        let sql = if tables::is_entity(table) {
            format!(
                "INSERT OR REPLACE INTO {table} ({}) SELECT {projection} FROM {source}",
                column_list(expected)
            )
        } else if self.table_exists(table)? {
            format!(
                "DELETE FROM {table}; INSERT INTO {table} ({}) SELECT {projection} FROM {source}",
                column_list(expected)
            )
        } else {
            format!("CREATE TABLE {table} AS SELECT {projection} FROM {source}")
        };
        self.conn.execute_batch(&sql)?;

        let count = self.count_table(table)?;
        info!(table, count, path = %path.display(), "loaded table");
        Ok(count)
    }

    /// Load every known table for which the data directory has a
    /// `<table>.parquet` or `<table>.csv` file. Returns the tables loaded.
    pub fn load_dir(&self, data_dir: &Path) -> Result<Vec<(String, usize)>, StoreError> {
        let mut loaded = Vec::new();
        for (table, schema) in tables::loadable() {
            let Some(path) = find_source(data_dir, table) else {
                debug!(table, dir = %data_dir.display(), "no source file");
                continue;
            };
            let count = self.load_table(table, &schema, &path)?;
            loaded.push((table.to_string(), count));
        }
        Ok(loaded)
    }

    /// Read a Parquet or CSV file shaped to `expected`, without storing it.
    pub fn read_file(&self, label: &str, expected: &Schema, path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
        let (source, projection) = self.open_source(label, expected, path)?;
        self.query_arrow(&format!("SELECT {projection} FROM {source}"))
    }

    /// The DuckDB table function for `path` and a projection casting it to
    /// `expected`. Fails when a required column is absent.
    fn open_source(&self, table: &str, expected: &Schema, path: &Path) -> Result<(String, String), StoreError> {
        if !path.exists() {
            return Err(StoreError::SourceNotFound(path.to_path_buf()));
        }
        let (source, actual) = match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => (
                format!("read_parquet('{}')", quoted_path(path)),
                parquet_schema(path)?,
            ),
            Some("csv") => {
                let source = format!("read_csv_auto('{}', header = true)", quoted_path(path));
                let schema = self.source_schema(&source)?;
                (source, schema)
            }
            _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        };

        let missing = missing_required(expected, &actual);
        if !missing.is_empty() {
            return Err(StoreError::MissingColumns {
                table: table.to_string(),
                columns: missing,
            });
        }
        Ok((source, cast_projection(expected, &actual)))
    }

    fn source_schema(&self, source: &str) -> Result<SchemaRef, StoreError> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {source} LIMIT 0"))?;
        let arrow = stmt.query_arrow([])?;
        Ok(arrow.get_schema())
    }

    /// Write the full contents of `table` to a Parquet file.
    pub fn export_table(&self, table: &str, path: &Path) -> Result<usize, StoreError> {
        let batches = self.query_arrow(&format!("SELECT * FROM {table}"))?;
        let schema = match batches.first() {
            Some(b) => b.schema(),
            None => self.source_schema(table)?,
        };
        let rows = write_parquet(path, schema, &batches)?;
        info!(table, rows, path = %path.display(), "exported table");
        Ok(rows)
    }

    // ── Counts ──

    pub fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn find_source(dir: &Path, table: &str) -> Option<PathBuf> {
    ["parquet", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{table}.{ext}")))
        .find(|p| p.exists())
}

/// `path` for use inside a single-quoted SQL string.
fn quoted_path(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

fn parquet_schema(path: &Path) -> Result<SchemaRef, StoreError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    Ok(builder.schema().clone())
}

/// Read all record batches from a Parquet file.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Write record batches to a Parquet file. Returns the number of rows written.
pub fn write_parquet(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<usize, StoreError> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, Arc::clone(&schema), None)?;
    let mut rows = 0;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;
    Ok(rows)
}
