//! Reads of the administrator-managed reference tables.

use gebruiksruimte_core::coefficient::{CoefficientBackend, CoefficientRow, CoefficientSchema, CoefficientTable};
use gebruiksruimte_core::model::{CropNormRow, DerogationNormRow, PhosphateNormRow};
use gebruiksruimte_core::{CoreError, ReferenceTables, reference};

use crate::StoreError;
use crate::columns::{Columns, required};
use crate::duck::DuckStore;

impl DuckStore {
    /// All three norm tables.
    pub fn reference_tables(&self) -> Result<ReferenceTables, StoreError> {
        Ok(ReferenceTables {
            crop_norms: self.crop_norms()?,
            phosphate_norms: self.phosphate_norms()?,
            derogation_norms: self.derogation_norms()?,
        })
    }

    pub fn crop_norms(&self) -> Result<Vec<CropNormRow>, StoreError> {
        let batches = self.query_arrow(&format!(
            "SELECT * FROM {} ORDER BY year, crop",
            reference::CROP_NORMS
        ))?;
        let mut rows = Vec::new();
        for batch in &batches {
            let cols = Columns::new(batch);
            let ids = cols.strings("id")?;
            let years = cols.i32s("year")?;
            let crops = cols.strings("crop")?;
            let clay = cols.f64s("n_clay")?;
            let sand_nwc = cols.f64s("n_sand_north_west_central")?;
            let sand_south = cols.f64s("n_sand_south")?;
            let loess = cols.f64s("n_loess")?;
            let peat = cols.f64s("n_peat")?;
            for i in 0..cols.len() {
                rows.push(CropNormRow {
                    id: required(&ids, i, "id")?,
                    year: required(&years, i, "year")?,
                    crop: required(&crops, i, "crop")?,
                    n_clay: clay[i],
                    n_sand_north_west_central: sand_nwc[i],
                    n_sand_south: sand_south[i],
                    n_loess: loess[i],
                    n_peat: peat[i],
                });
            }
        }
        Ok(rows)
    }

    pub fn crop_norm(&self, id: &str) -> Result<CropNormRow, StoreError> {
        self.crop_norms()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("crop", id))
    }

    pub fn phosphate_norms(&self) -> Result<Vec<PhosphateNormRow>, StoreError> {
        let batches = self.query_arrow(&format!(
            "SELECT * FROM {} ORDER BY year, land_type, p_cacl2_from, p_al_from",
            reference::PHOSPHATE_NORMS
        ))?;
        let mut rows = Vec::new();
        for batch in &batches {
            let cols = Columns::new(batch);
            let years = cols.i32s("year")?;
            let land = cols.strings("land_type")?;
            let cacl2_from = cols.f64s("p_cacl2_from")?;
            let cacl2_to = cols.f64s("p_cacl2_to")?;
            let al_from = cols.f64s("p_al_from")?;
            let al_to = cols.f64s("p_al_to")?;
            let norm = cols.f64s("norm_kg_ha")?;
            let description = cols.strings("description")?;
            for i in 0..cols.len() {
                rows.push(PhosphateNormRow {
                    year: required(&years, i, "year")?,
                    land_type: required(&land, i, "land_type")?,
                    p_cacl2_from: required(&cacl2_from, i, "p_cacl2_from")?,
                    p_cacl2_to: required(&cacl2_to, i, "p_cacl2_to")?,
                    p_al_from: required(&al_from, i, "p_al_from")?,
                    p_al_to: required(&al_to, i, "p_al_to")?,
                    norm_kg_ha: required(&norm, i, "norm_kg_ha")?,
                    description: description[i].clone(),
                });
            }
        }
        Ok(rows)
    }

    pub fn derogation_norms(&self) -> Result<Vec<DerogationNormRow>, StoreError> {
        let batches = self.query_arrow(&format!(
            "SELECT * FROM {} ORDER BY year",
            reference::DEROGATION_NORMS
        ))?;
        let mut rows = Vec::new();
        for batch in &batches {
            let cols = Columns::new(batch);
            let years = cols.i32s("year")?;
            let nv = cols.bools("nv_area")?;
            let derog = cols.bools("derogation")?;
            let norm = cols.f64s("n_animal_kg_ha")?;
            for i in 0..cols.len() {
                rows.push(DerogationNormRow {
                    year: required(&years, i, "year")?,
                    nv_area: required(&nv, i, "nv_area")?,
                    derogation: required(&derog, i, "derogation")?,
                    n_animal_kg_ha: required(&norm, i, "n_animal_kg_ha")?,
                });
            }
        }
        Ok(rows)
    }

    /// The working-coefficient table from the highest-priority backend present.
    pub fn coefficient_table(&self) -> Result<CoefficientTable, StoreError> {
        let legacy = DuckCoefficientBackend::new(self, CoefficientSchema::Legacy);
        let current = DuckCoefficientBackend::new(self, CoefficientSchema::Current);
        let backends: [&dyn CoefficientBackend; 2] = [&legacy, &current];
        Ok(CoefficientTable::from_backends(&backends)?)
    }

    fn coefficient_rows(&self, schema: CoefficientSchema) -> Result<Vec<CoefficientRow>, StoreError> {
        let (table, year_column) = match schema {
            CoefficientSchema::Legacy => (reference::LEGACY_COEFFICIENTS, "year"),
            CoefficientSchema::Current => (reference::WORKING_COEFFICIENTS, "NULL::INTEGER AS year"),
        };
        let batches = self.query_arrow(&format!(
            "SELECT {year_column}, fertilizer, context, pct FROM {table}"
        ))?;
        let mut rows = Vec::new();
        for batch in &batches {
            let cols = Columns::new(batch);
            let years = cols.i32s("year")?;
            let fertilizers = cols.strings("fertilizer")?;
            let contexts = cols.strings("context")?;
            let pcts = cols.f64s("pct")?;
            for i in 0..cols.len() {
                rows.push(CoefficientRow::new(
                    years[i],
                    &required(&fertilizers, i, "fertilizer")?,
                    contexts[i].as_deref(),
                    required(&pcts, i, "pct")?,
                ));
            }
        }
        Ok(rows)
    }
}

/// A coefficient backend over one of the two DuckDB coefficient tables.
pub struct DuckCoefficientBackend<'a> {
    store: &'a DuckStore,
    schema: CoefficientSchema,
}

impl<'a> DuckCoefficientBackend<'a> {
    pub fn new(store: &'a DuckStore, schema: CoefficientSchema) -> Self {
        Self { store, schema }
    }

    fn table(&self) -> &'static str {
        match self.schema {
            CoefficientSchema::Legacy => reference::LEGACY_COEFFICIENTS,
            CoefficientSchema::Current => reference::WORKING_COEFFICIENTS,
        }
    }
}

fn backend_error(e: StoreError) -> CoreError {
    CoreError::Backend(Box::new(e))
}

impl CoefficientBackend for DuckCoefficientBackend<'_> {
    fn schema(&self) -> CoefficientSchema {
        self.schema
    }

    fn is_available(&self) -> Result<bool, CoreError> {
        self.store.table_exists(self.table()).map_err(backend_error)
    }

    fn load_rows(&self) -> Result<Vec<CoefficientRow>, CoreError> {
        self.store.coefficient_rows(self.schema).map_err(backend_error)
    }
}
