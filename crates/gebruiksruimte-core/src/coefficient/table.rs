//! Working-coefficient tables and the backends that supply them.
//!
//! Two table schemas exist: a legacy one keyed by `(year, category, context)`
//! and the current one keyed by `(category, context)`. Both normalise to
//! [`CoefficientRow`]; a row without a year applies to every year.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub year: Option<i32>,
    pub category: String,
    pub context: String,
    pub percent: f64,
}

impl CoefficientRow {
    pub fn new(year: Option<i32>, category: &str, context: Option<&str>, percent: f64) -> Self {
        Self {
            year,
            category: category.trim().to_string(),
            context: normalize_context(context),
            percent,
        }
    }
}

/// Blank, `NaN` and `None` contexts all mean "no context".
pub fn normalize_context(context: Option<&str>) -> String {
    match context.map(str::trim) {
        None => String::new(),
        Some(c) if c.eq_ignore_ascii_case("nan") || c.eq_ignore_ascii_case("none") => String::new(),
        Some(c) => c.to_string(),
    }
}

/// Which table layout a backend reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoefficientSchema {
    /// Year-keyed rows.
    Legacy,
    /// Year-less rows.
    Current,
}

/// A source of working-coefficient rows.
pub trait CoefficientBackend {
    fn schema(&self) -> CoefficientSchema;

    /// Whether the backing table exists.
    fn is_available(&self) -> Result<bool, CoreError>;

    /// All rows, already normalised.
    fn load_rows(&self) -> Result<Vec<CoefficientRow>, CoreError>;
}

/// Fixed backend priority: legacy first, then current.
pub fn priority(schema: CoefficientSchema) -> u8 {
    match schema {
        CoefficientSchema::Legacy => 0,
        CoefficientSchema::Current => 1,
    }
}

/// Rows held in memory, mostly for tests and CLI one-offs.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    schema: CoefficientSchema,
    rows: Option<Vec<CoefficientRow>>,
}

impl InMemoryBackend {
    pub fn new(schema: CoefficientSchema, rows: Vec<CoefficientRow>) -> Self {
        Self {
            schema,
            rows: Some(rows),
        }
    }

    /// A backend whose table does not exist.
    pub fn missing(schema: CoefficientSchema) -> Self {
        Self { schema, rows: None }
    }
}

impl CoefficientBackend for InMemoryBackend {
    fn schema(&self) -> CoefficientSchema {
        self.schema
    }

    fn is_available(&self) -> Result<bool, CoreError> {
        Ok(self.rows.is_some())
    }

    fn load_rows(&self) -> Result<Vec<CoefficientRow>, CoreError> {
        Ok(self.rows.clone().unwrap_or_default())
    }
}

/// The active working-coefficient table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub source: Option<CoefficientSchema>,
    pub rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub fn new(source: CoefficientSchema, rows: Vec<CoefficientRow>) -> Self {
        Self {
            source: Some(source),
            rows,
        }
    }

    /// Rows from the first available backend in priority order; empty when none is.
    pub fn from_backends(backends: &[&dyn CoefficientBackend]) -> Result<Self, CoreError> {
        let mut ordered: Vec<&dyn CoefficientBackend> = backends.to_vec();
        ordered.sort_by_key(|b| priority(b.schema()));
        for backend in ordered {
            if backend.is_available()? {
                let rows = backend.load_rows()?;
                info!(schema = ?backend.schema(), count = rows.len(), "loaded working coefficients");
                return Ok(Self::new(backend.schema(), rows));
            }
        }
        info!("no working-coefficient table available");
        Ok(Self::default())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Coefficient percent for `(year, category, context)`.
    ///
    /// Fallbacks, in order: exact year with context, exact year without
    /// context, any year with context, any year without context. "Any year"
    /// prefers the latest year not after `year`, then the earliest later one.
    pub fn lookup(&self, year: i32, category: &str, context: &str) -> Option<f64> {
        let context = normalize_context(Some(context));
        let rows: Vec<&CoefficientRow> = self
            .rows
            .iter()
            .filter(|r| r.category.eq_ignore_ascii_case(category.trim()))
            .collect();

        let same_year = |r: &CoefficientRow| r.year.is_none_or(|y| y == year);
        let with_context = |r: &CoefficientRow| !context.is_empty() && r.context == context;
        let without_context = |r: &CoefficientRow| r.context.is_empty();

        let found = rows
            .iter()
            .copied()
            .find(|r| same_year(*r) && with_context(*r))
            .or_else(|| rows.iter().copied().find(|r| same_year(*r) && without_context(*r)))
            .or_else(|| closest_year(rows.iter().copied().filter(|r| with_context(*r)), year))
            .or_else(|| closest_year(rows.iter().copied().filter(|r| without_context(*r)), year));

        if let Some(row) = found {
            debug!(
                category,
                context = %context,
                year,
                row_year = ?row.year,
                percent = row.percent,
                "coefficient row matched"
            );
        }
        found.map(|r| r.percent)
    }
}

fn closest_year<'r>(
    rows: impl Iterator<Item = &'r CoefficientRow>,
    year: i32,
) -> Option<&'r CoefficientRow> {
    let candidates: Vec<&CoefficientRow> = rows.collect();
    let year_of = |r: &CoefficientRow| r.year.unwrap_or(year);
    candidates
        .iter()
        .copied()
        .filter(|r| year_of(*r) <= year)
        .max_by_key(|r| year_of(*r))
        .or_else(|| candidates.iter().copied().min_by_key(|r| year_of(*r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAT: &str = "Drijfmest van varkens";

    fn legacy(rows: &[(i32, Option<&str>, f64)]) -> CoefficientTable {
        CoefficientTable::new(
            CoefficientSchema::Legacy,
            rows.iter()
                .map(|&(y, c, p)| CoefficientRow::new(Some(y), CAT, c, p))
                .collect(),
        )
    }

    #[test]
    fn context_normalisation() {
        assert_eq!(normalize_context(None), "");
        assert_eq!(normalize_context(Some("NaN")), "");
        assert_eq!(normalize_context(Some(" None ")), "");
        assert_eq!(normalize_context(Some("  ")), "");
        assert_eq!(normalize_context(Some(" Op klei en veen ")), "Op klei en veen");
    }

    #[test]
    fn exact_year_and_context_first() {
        let t = legacy(&[(2024, Some("Op klei en veen"), 60.0), (2024, None, 50.0)]);
        assert_eq!(t.lookup(2024, CAT, "Op klei en veen"), Some(60.0));
    }

    #[test]
    fn exact_year_empty_context_second() {
        let t = legacy(&[(2023, Some("Op klei en veen"), 60.0), (2024, Some("NaN"), 50.0)]);
        assert_eq!(t.lookup(2024, CAT, "Op klei en veen"), Some(50.0));
    }

    #[test]
    fn any_year_prefers_latest_not_after() {
        let t = legacy(&[
            (2020, Some("Op zand en löss"), 70.0),
            (2022, Some("Op zand en löss"), 72.0),
            (2026, Some("Op zand en löss"), 80.0),
        ]);
        assert_eq!(t.lookup(2024, CAT, "Op zand en löss"), Some(72.0));
        assert_eq!(t.lookup(2019, CAT, "Op zand en löss"), Some(70.0));
    }

    #[test]
    fn any_year_empty_context_last() {
        let t = legacy(&[(2021, None, 55.0), (2022, Some("Op klei en veen"), 60.0)]);
        assert_eq!(t.lookup(2024, CAT, "Op zand en löss"), Some(55.0));
        assert_eq!(t.lookup(2024, "Compost", ""), None);
    }

    #[test]
    fn current_rows_match_every_year() {
        let t = CoefficientTable::new(
            CoefficientSchema::Current,
            vec![CoefficientRow::new(None, CAT, Some("Op klei en veen"), 60.0)],
        );
        assert_eq!(t.lookup(1999, CAT, "Op klei en veen"), Some(60.0));
        assert_eq!(t.lookup(2031, "drijfmest van varkens", "Op klei en veen"), Some(60.0));
    }

    #[test]
    fn backends_tried_in_priority_order() {
        let legacy = InMemoryBackend::new(
            CoefficientSchema::Legacy,
            vec![CoefficientRow::new(Some(2024), CAT, None, 50.0)],
        );
        let current = InMemoryBackend::new(
            CoefficientSchema::Current,
            vec![CoefficientRow::new(None, CAT, None, 60.0)],
        );
        let t = CoefficientTable::from_backends(&[&current, &legacy]).unwrap();
        assert_eq!(t.source, Some(CoefficientSchema::Legacy));
        assert_eq!(t.lookup(2024, CAT, ""), Some(50.0));
    }

    #[test]
    fn unavailable_backend_is_skipped() {
        let legacy = InMemoryBackend::missing(CoefficientSchema::Legacy);
        let current = InMemoryBackend::new(
            CoefficientSchema::Current,
            vec![CoefficientRow::new(None, CAT, None, 60.0)],
        );
        let t = CoefficientTable::from_backends(&[&legacy, &current]).unwrap();
        assert_eq!(t.source, Some(CoefficientSchema::Current));
    }

    #[test]
    fn no_backend_gives_empty_table() {
        let t = CoefficientTable::from_backends(&[&InMemoryBackend::missing(
            CoefficientSchema::Current,
        )])
        .unwrap();
        assert!(t.is_empty());
        assert_eq!(t.source, None);
    }
}
