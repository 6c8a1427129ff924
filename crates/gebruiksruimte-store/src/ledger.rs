//! Write paths and reports: usage norms, applications, batch import.
//!
//! Each operation loads the rows it needs, runs the pure resolvers from
//! `gebruiksruimte-core` and writes a single row back.

use std::path::Path;

use arrow::datatypes::{DataType, Field, Schema};
use gebruiksruimte_core::effective::{ApplicationFacts, evaluate_at, raw_amounts};
use gebruiksruimte_core::import::{ImportOutcome, ImportRow, SkipReason, SkippedRow, plan_import};
use gebruiksruimte_core::model::{Application, RawAmounts, UsageNorm};
use gebruiksruimte_core::parse::parse_date;
use gebruiksruimte_core::{
    AggregationInput, AggregationReport, CallContext, RedistributionMode, aggregate, resolve_usage_norm,
};
use tracing::{info, warn};

use crate::StoreError;
use crate::columns::Columns;
use crate::duck::DuckStore;

/// An application as entered by a user, before amounts are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub usage_norm_id: String,
    pub fertilizer_id: String,
    /// `DD-MM-YYYY` or ISO `YYYY-MM-DD`.
    pub date: String,
    pub quantity_kg_ha: f64,
    /// Per-hectare amounts typed in by the user; required for animal manure.
    pub manual: Option<RawAmounts>,
    pub own_farm: bool,
    pub notes: Option<String>,
}

fn import_schema() -> Schema {
    Schema::new(vec![
        Field::new("company", DataType::Utf8, true),
        Field::new("parcel", DataType::Utf8, true),
        Field::new("crop", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("derogation", DataType::Int32, true),
    ])
}

impl DuckStore {
    // ── Usage norms ──

    /// Resolve and store the usage norm for one (parcel, crop, year).
    pub fn create_usage_norm(
        &self,
        ctx: &CallContext,
        company_id: &str,
        parcel_id: &str,
        crop_id: &str,
        year: i32,
        derogation: bool,
    ) -> Result<UsageNorm, StoreError> {
        let user = ctx.effective_user();
        if !self.companies(user)?.iter().any(|c| c.id == company_id) {
            return Err(StoreError::not_found("company", company_id));
        }
        let parcel = self.parcel(user, parcel_id)?;
        let crop = self.crop_norm(crop_id)?;

        if self.usage_norm_exists(parcel_id, crop_id, year)? {
            return Err(StoreError::DuplicateUsageNorm {
                parcel_id: parcel_id.to_string(),
                crop_id: crop_id.to_string(),
                year,
            });
        }

        let tables = self.reference_tables()?;
        let resolved = resolve_usage_norm(ctx, &tables, &parcel, &crop.crop, derogation, year)?;
        let mut norm = UsageNorm {
            id: String::new(),
            company_id: company_id.to_string(),
            parcel_id: parcel_id.to_string(),
            crop_id: crop_id.to_string(),
            year,
            n_total_kg_ha: resolved.n_total_kg_ha,
            n_animal_kg_ha: resolved.n_animal_kg_ha,
            p2o5_kg_ha: resolved.p2o5_kg_ha,
            derogation,
            user_id: user.to_string(),
        };
        norm.id = self.insert_usage_norm(&norm)?;
        info!(
            id = %norm.id,
            user,
            acting_user = ctx.user_id(),
            parcel = %parcel.name,
            crop = %crop.crop,
            year,
            "created usage norm"
        );
        Ok(norm)
    }

    /// Re-resolve a stored usage norm against the current reference tables,
    /// optionally switching its derogation flag.
    pub fn recalculate_usage_norm(
        &self,
        ctx: &CallContext,
        id: &str,
        derogation: Option<bool>,
    ) -> Result<UsageNorm, StoreError> {
        let user = ctx.effective_user();
        let mut norm = self.usage_norm(user, id)?;
        let parcel = self.parcel(user, &norm.parcel_id)?;
        let crop = self.crop_norm(&norm.crop_id)?;
        let derogation = derogation.unwrap_or(norm.derogation);

        let tables = self.reference_tables()?;
        let resolved = resolve_usage_norm(ctx, &tables, &parcel, &crop.crop, derogation, norm.year)?;
        norm.n_total_kg_ha = resolved.n_total_kg_ha;
        norm.n_animal_kg_ha = resolved.n_animal_kg_ha;
        norm.p2o5_kg_ha = resolved.p2o5_kg_ha;
        norm.derogation = derogation;
        self.update_usage_norm(&norm)?;
        info!(id, user, derogation, "recalculated usage norm");
        Ok(norm)
    }

    // ── Applications ──

    /// Derive raw and effective amounts for `new` and store it.
    pub fn record_application(&self, ctx: &CallContext, new: &NewApplication) -> Result<Application, StoreError> {
        let mut app = self.derive_application(ctx, new)?;
        app.id = self.insert_application(&app, ctx.effective_user())?;
        info!(
            id = %app.id,
            user = ctx.effective_user(),
            fertilizer = %app.fertilizer_id,
            coefficient = ?app.coefficient_pct,
            "recorded application"
        );
        Ok(app)
    }

    /// Replace an existing application, recomputing every derived amount.
    pub fn edit_application(
        &self,
        ctx: &CallContext,
        id: &str,
        new: &NewApplication,
    ) -> Result<Application, StoreError> {
        let user = ctx.effective_user();
        self.application(user, id)?;
        let mut app = self.derive_application(ctx, new)?;
        app.id = id.to_string();
        self.update_application(&app, user)?;
        info!(id, user, "updated application");
        Ok(app)
    }

    fn derive_application(&self, ctx: &CallContext, new: &NewApplication) -> Result<Application, StoreError> {
        let user = ctx.effective_user();
        let date = parse_date(&new.date)?;
        let norm = self.usage_norm(user, &new.usage_norm_id)?;
        let fertilizer = self.fertilizer(&new.fertilizer_id)?;
        let parcel = self.parcel(user, &norm.parcel_id)?;
        let crop = self.crop_norm(&norm.crop_id)?;
        let table = self.coefficient_table()?;

        let raw = raw_amounts(&fertilizer, new.quantity_kg_ha, new.manual);
        let effect = evaluate_at(
            ctx,
            &table,
            &ApplicationFacts {
                fertilizer: &fertilizer,
                raw,
                own_farm: new.own_farm,
                crop: &crop.crop,
                soil_type: &parcel.soil_type,
            },
            date,
        );
        let coefficient = effect.coefficient;

        Ok(Application {
            id: String::new(),
            usage_norm_id: norm.id,
            company_id: norm.company_id,
            parcel_id: norm.parcel_id,
            fertilizer_id: fertilizer.id,
            date,
            quantity_kg_ha: new.quantity_kg_ha,
            raw,
            effective: Some(effect.amounts),
            coefficient_pct: Some(coefficient.percent),
            context: Some(coefficient.context),
            category: Some(coefficient.category),
            own_farm: new.own_farm,
            notes: new.notes.clone(),
        })
    }

    // ── Import ──

    /// Read import rows (`company`, `parcel`, `crop`, `year`, optional
    /// `derogation` as 0/1) from a CSV or Parquet file.
    pub fn read_import_rows(&self, path: &Path) -> Result<Vec<ImportRow>, StoreError> {
        let batches = self.read_file("import", &import_schema(), path)?;
        let mut rows = Vec::new();
        for batch in &batches {
            let cols = Columns::new(batch);
            let companies = cols.strings("company")?;
            let parcels = cols.strings("parcel")?;
            let crops = cols.strings("crop")?;
            let years = cols.i32s("year")?;
            let derogation = cols.i32s("derogation")?;
            for i in 0..cols.len() {
                rows.push(ImportRow {
                    company: companies[i].clone().unwrap_or_default(),
                    parcel: parcels[i].clone().unwrap_or_default(),
                    crop: crops[i].clone().unwrap_or_default(),
                    year: years[i],
                    derogation: derogation[i].is_some_and(|d| d != 0),
                });
            }
        }
        Ok(rows)
    }

    /// Create usage norms for every resolvable row. Rows whose
    /// (parcel, crop, year) already has a norm are skipped.
    pub fn import_usage_norms(&self, ctx: &CallContext, rows: &[ImportRow]) -> Result<ImportOutcome, StoreError> {
        let user = ctx.effective_user();
        let companies = self.companies(user)?;
        let parcels = self.parcels(user)?;
        let tables = self.reference_tables()?;

        let plan = plan_import(ctx, rows, &companies, &parcels, &tables);
        let mut outcome = ImportOutcome {
            imported: 0,
            skipped: plan.skipped,
        };
        for planned in &plan.accepted {
            if self.usage_norm_exists(&planned.parcel_id, &planned.crop_id, planned.year)? {
                outcome.skipped.push(SkippedRow {
                    row: planned.row.clone(),
                    reason: SkipReason::AlreadyExists,
                });
                continue;
            }
            self.insert_usage_norm(&UsageNorm {
                id: String::new(),
                company_id: planned.company_id.clone(),
                parcel_id: planned.parcel_id.clone(),
                crop_id: planned.crop_id.clone(),
                year: planned.year,
                n_total_kg_ha: planned.norm.n_total_kg_ha,
                n_animal_kg_ha: planned.norm.n_animal_kg_ha,
                p2o5_kg_ha: planned.norm.p2o5_kg_ha,
                derogation: planned.derogation,
                user_id: user.to_string(),
            })?;
            outcome.imported += 1;
        }
        info!(
            user,
            imported = outcome.imported,
            skipped = outcome.skipped.len(),
            "imported usage norms"
        );
        Ok(outcome)
    }

    // ── Reports ──

    /// Aggregate `year` for the effective user of `ctx`.
    pub fn report(
        &self,
        ctx: &CallContext,
        year: i32,
        mode: &RedistributionMode,
        company_filter: Option<&[String]>,
    ) -> Result<AggregationReport, StoreError> {
        let user = ctx.effective_user();
        let companies = self.companies(user)?;
        let parcels = self.parcels(user)?;
        let crops = self.crop_norms()?;
        let usage_norms = self.usage_norms(user, None)?;
        let fertilizers = self.fertilizers()?;
        // Applications belong to the year of their usage norm, not of their date.
        let applications = self.applications(user, None)?;
        let coefficients = self.coefficient_table()?;
        if !usage_norms.iter().any(|n| n.year == year) {
            warn!(user, year, "no usage norms for year");
        }

        let input = AggregationInput {
            year,
            companies: &companies,
            parcels: &parcels,
            crops: &crops,
            usage_norms: &usage_norms,
            fertilizers: &fertilizers,
            applications: &applications,
            coefficients: &coefficients,
        };
        Ok(aggregate(ctx, &input, mode, company_filter))
    }
}
