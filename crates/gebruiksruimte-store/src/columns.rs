//! Typed column access over DuckDB result batches.
//!
//! DuckDB picks its own Arrow types (BIGINT vs INTEGER, DECIMAL for numeric
//! literals, string views), so every column is cast to the expected type
//! before it is downcast.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int32Type};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::date32_to_datetime;
use chrono::NaiveDate;

use crate::StoreError;

pub(crate) struct Columns<'a> {
    batch: &'a RecordBatch,
}

impl<'a> Columns<'a> {
    pub(crate) fn new(batch: &'a RecordBatch) -> Self {
        Self { batch }
    }

    pub(crate) fn len(&self) -> usize {
        self.batch.num_rows()
    }

    fn cast(&self, name: &str, to: &DataType) -> Result<ArrayRef, StoreError> {
        let col = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| StoreError::Other(format!("result has no column '{name}'")))?;
        Ok(cast(col, to)?)
    }

    fn mismatch(name: &str, to: &str) -> StoreError {
        StoreError::Other(format!("column '{name}' is not {to}"))
    }

    pub(crate) fn strings(&self, name: &str) -> Result<Vec<Option<String>>, StoreError> {
        let arr = self.cast(name, &DataType::Utf8)?;
        let arr = arr
            .as_string_opt::<i32>()
            .ok_or_else(|| Self::mismatch(name, "utf8"))?;
        Ok(arr.iter().map(|v| v.map(str::to_string)).collect())
    }

    pub(crate) fn f64s(&self, name: &str) -> Result<Vec<Option<f64>>, StoreError> {
        let arr = self.cast(name, &DataType::Float64)?;
        let arr = arr
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| Self::mismatch(name, "f64"))?;
        Ok(arr.iter().collect())
    }

    pub(crate) fn i32s(&self, name: &str) -> Result<Vec<Option<i32>>, StoreError> {
        let arr = self.cast(name, &DataType::Int32)?;
        let arr = arr
            .as_primitive_opt::<Int32Type>()
            .ok_or_else(|| Self::mismatch(name, "i32"))?;
        Ok(arr.iter().collect())
    }

    pub(crate) fn bools(&self, name: &str) -> Result<Vec<Option<bool>>, StoreError> {
        let arr = self.cast(name, &DataType::Boolean)?;
        let arr = arr
            .as_boolean_opt()
            .ok_or_else(|| Self::mismatch(name, "boolean"))?;
        Ok(arr.iter().collect())
    }

    pub(crate) fn dates(&self, name: &str) -> Result<Vec<Option<NaiveDate>>, StoreError> {
        let arr = self.cast(name, &DataType::Date32)?;
        let arr = arr
            .as_primitive_opt::<Date32Type>()
            .ok_or_else(|| Self::mismatch(name, "date"))?;
        Ok((0..arr.len())
            .map(|i| {
                if arr.is_null(i) {
                    None
                } else {
                    date32_to_datetime(arr.value(i)).map(|dt| dt.date())
                }
            })
            .collect())
    }
}

/// The non-null value at `row`, or an error naming the column.
pub(crate) fn required<T: Clone>(values: &[Option<T>], row: usize, column: &str) -> Result<T, StoreError> {
    values
        .get(row)
        .cloned()
        .flatten()
        .ok_or_else(|| StoreError::Other(format!("null in required column '{column}' at row {row}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Date32Array, Int64Array, LargeStringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("name", DataType::LargeUtf8, true),
            Field::new("year", DataType::Int64, true),
            Field::new("flag", DataType::Boolean, true),
            Field::new("day", DataType::Date32, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(LargeStringArray::from(vec![Some("Kamp 1"), None])),
                Arc::new(Int64Array::from(vec![Some(2024), Some(2025)])),
                Arc::new(BooleanArray::from(vec![Some(true), None])),
                Arc::new(Date32Array::from(vec![Some(19_814), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn casts_before_downcast() {
        let b = batch();
        let cols = Columns::new(&b);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.strings("name").unwrap(), vec![Some("Kamp 1".to_string()), None]);
        assert_eq!(cols.i32s("year").unwrap(), vec![Some(2024), Some(2025)]);
        assert_eq!(cols.f64s("year").unwrap(), vec![Some(2024.0), Some(2025.0)]);
        assert_eq!(cols.bools("flag").unwrap(), vec![Some(true), None]);
        assert_eq!(
            cols.dates("day").unwrap(),
            vec![NaiveDate::from_ymd_opt(2024, 4, 1), None]
        );
    }

    #[test]
    fn required_rejects_nulls_and_unknown_columns() {
        let b = batch();
        let cols = Columns::new(&b);
        let names = cols.strings("name").unwrap();
        assert_eq!(required(&names, 0, "name").unwrap(), "Kamp 1");
        assert!(required(&names, 1, "name").is_err());
        assert!(cols.strings("missing").is_err());
    }
}
