//! Usage-space aggregation: allowed versus applied nutrients per company and year.
//!
//! Allowed amounts come from the usage norms, scaled by parcel area. Applied
//! amounts come from the effective per-hectare amounts of each application,
//! scaled by the area of the parcel its usage norm covers. An application
//! counts toward the company that owns its usage norm, not the company
//! recorded on the application.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coefficient::CoefficientTable;
use crate::context::CallContext;
use crate::effective::{ApplicationFacts, evaluate_at};
use crate::model::{Application, Company, CropNormRow, EffectiveAmounts, Fertilizer, Parcel, UsageNorm};

/// How non-animal applications are attributed across companies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedistributionMode {
    /// Every company keeps its own applications.
    #[default]
    PerCompany,
    /// All non-animal nitrogen and all non-animal phosphate move to the named
    /// head company. Animal amounts stay where they are.
    HeadCompany(String),
}

/// Everything one aggregation reads. All slices belong to the effective user.
#[derive(Debug, Clone, Copy)]
pub struct AggregationInput<'a> {
    pub year: i32,
    pub companies: &'a [Company],
    pub parcels: &'a [Parcel],
    pub crops: &'a [CropNormRow],
    pub usage_norms: &'a [UsageNorm],
    pub fertilizers: &'a [Fertilizer],
    pub applications: &'a [Application],
    /// Used only for applications stored without effective amounts.
    pub coefficients: &'a CoefficientTable,
}

/// Allowed against applied for one nutrient, in kg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub allowed: f64,
    pub applied: f64,
    pub remaining: f64,
    pub shortfall: f64,
    pub percentage: f64,
}

impl Balance {
    pub fn new(allowed: f64, applied: f64) -> Self {
        Self {
            allowed,
            applied,
            remaining: (allowed - applied).max(0.0),
            shortfall: (applied - allowed).max(0.0),
            percentage: if allowed == 0.0 { 0.0 } else { applied / allowed * 100.0 },
        }
    }
}

/// Applied kg split by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedSplit {
    pub n_animal: f64,
    pub n_other: f64,
    pub p2o5_animal: f64,
    pub p2o5_other: f64,
    pub k2o: f64,
}

impl AppliedSplit {
    fn add(&mut self, other: &AppliedSplit) {
        self.n_animal += other.n_animal;
        self.n_other += other.n_other;
        self.p2o5_animal += other.p2o5_animal;
        self.p2o5_other += other.p2o5_other;
        self.k2o += other.k2o;
    }

    fn n_total(&self) -> f64 {
        self.n_animal + self.n_other
    }

    fn p2o5_total(&self) -> f64 {
        self.p2o5_animal + self.p2o5_other
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Allowed {
    area_ha: f64,
    n_total: f64,
    n_animal: f64,
    p2o5: f64,
}

impl Allowed {
    fn add(&mut self, other: &Allowed) {
        self.area_ha += other.area_ha;
        self.n_total += other.n_total;
        self.n_animal += other.n_animal;
        self.p2o5 += other.p2o5;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyTotals {
    pub company_id: String,
    pub company_name: String,
    pub area_ha: f64,
    pub n_total: Balance,
    /// Animal nitrogen against the animal sub-norm.
    pub n_animal: Balance,
    pub p2o5: Balance,
    pub applied: AppliedSplit,
}

impl CompanyTotals {
    fn build(company_id: &str, company_name: &str, allowed: &Allowed, applied: &AppliedSplit) -> Self {
        Self {
            company_id: company_id.to_string(),
            company_name: company_name.to_string(),
            area_ha: allowed.area_ha,
            n_total: Balance::new(allowed.n_total, applied.n_total()),
            n_animal: Balance::new(allowed.n_animal, applied.n_animal),
            p2o5: Balance::new(allowed.p2o5, applied.p2o5_total()),
            applied: *applied,
        }
    }
}

/// One counted application, for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub application_id: String,
    pub company_id: String,
    pub parcel_id: String,
    pub fertilizer: String,
    pub date: NaiveDate,
    pub area_ha: f64,
    pub coefficient_pct: Option<f64>,
    pub effective: EffectiveAmounts,
    pub applied: AppliedSplit,
    /// Effective amounts were missing on the record and computed here.
    pub recomputed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub year: i32,
    pub mode: RedistributionMode,
    pub companies: Vec<CompanyTotals>,
    pub totals: CompanyTotals,
    pub audit: Vec<AuditRow>,
    /// Applications left out for a missing usage norm or fertiliser.
    pub skipped: usize,
}

/// Aggregate one year for the effective user.
///
/// `company_filter` restricts the reported companies. Redistribution happens
/// before filtering, so a filtered head company still receives the amounts
/// of companies outside the filter.
pub fn aggregate(
    ctx: &CallContext,
    input: &AggregationInput,
    mode: &RedistributionMode,
    company_filter: Option<&[String]>,
) -> AggregationReport {
    let user = ctx.effective_user();
    let companies: BTreeMap<&str, &Company> = input
        .companies
        .iter()
        .filter(|c| c.user_id == user)
        .map(|c| (c.id.as_str(), c))
        .collect();
    let parcels: HashMap<&str, &Parcel> = input.parcels.iter().map(|p| (p.id.as_str(), p)).collect();
    let crops: HashMap<&str, &str> = input.crops.iter().map(|c| (c.id.as_str(), c.crop.as_str())).collect();
    let fertilizers: HashMap<&str, &Fertilizer> =
        input.fertilizers.iter().map(|f| (f.id.as_str(), f)).collect();
    let norms: BTreeMap<&str, &UsageNorm> = input
        .usage_norms
        .iter()
        .filter(|n| n.year == input.year && n.user_id == user)
        .map(|n| (n.id.as_str(), n))
        .collect();

    let area_of = |parcel_id: &str| parcels.get(parcel_id).map_or(0.0, |p| p.effective_area());

    // ── Allowed ──

    let mut allowed: BTreeMap<&str, Allowed> = companies.keys().map(|&id| (id, Allowed::default())).collect();
    for norm in norms.values() {
        let area = area_of(&norm.parcel_id);
        allowed.entry(norm.company_id.as_str()).or_default().add(&Allowed {
            area_ha: area,
            n_total: norm.n_total_kg_ha * area,
            n_animal: norm.n_animal_kg_ha * area,
            p2o5: norm.p2o5_kg_ha * area,
        });
    }

    // ── Applied ──

    let mut applied: BTreeMap<&str, AppliedSplit> =
        allowed.keys().map(|&id| (id, AppliedSplit::default())).collect();
    let mut audit = Vec::new();
    let mut skipped = 0;

    for app in input.applications {
        let Some(norm) = norms.get(app.usage_norm_id.as_str()) else {
            match input.usage_norms.iter().find(|n| n.id == app.usage_norm_id) {
                None => {
                    warn!(application = %app.id, usage_norm = %app.usage_norm_id, "application without usage norm excluded");
                    skipped += 1;
                }
                Some(other) => debug!(
                    application = %app.id,
                    usage_norm = %other.id,
                    norm_year = other.year,
                    "application belongs to another year or user"
                ),
            }
            continue;
        };
        let Some(fertilizer) = fertilizers.get(app.fertilizer_id.as_str()) else {
            warn!(application = %app.id, fertilizer = %app.fertilizer_id, "application without fertiliser excluded");
            skipped += 1;
            continue;
        };

        let area = area_of(&norm.parcel_id);
        let (effective, coefficient_pct, recomputed) = match app.effective {
            Some(eff) => (eff, app.coefficient_pct, false),
            None => {
                let facts = ApplicationFacts {
                    fertilizer,
                    raw: app.raw,
                    own_farm: app.own_farm,
                    crop: crops.get(norm.crop_id.as_str()).copied().unwrap_or_default(),
                    soil_type: parcels.get(norm.parcel_id.as_str()).map_or("", |p| p.soil_type.as_str()),
                };
                let effect = evaluate_at(ctx, input.coefficients, &facts, app.date);
                debug!(application = %app.id, "recomputed effective amounts");
                (effect.amounts, Some(effect.coefficient.percent), true)
            }
        };

        let phosphate_kg = effective.p2o5 * area;
        let animal = effective.n_animal > 0.0;
        let split = AppliedSplit {
            n_animal: effective.n_animal * area,
            n_other: (effective.n - effective.n_animal).max(0.0) * area,
            p2o5_animal: if animal { phosphate_kg } else { 0.0 },
            p2o5_other: if animal { 0.0 } else { phosphate_kg },
            k2o: app.raw.k2o * area,
        };
        applied.entry(norm.company_id.as_str()).or_default().add(&split);

        audit.push(AuditRow {
            application_id: app.id.clone(),
            company_id: norm.company_id.clone(),
            parcel_id: norm.parcel_id.clone(),
            fertilizer: fertilizer.name.clone(),
            date: app.date,
            area_ha: area,
            coefficient_pct,
            effective,
            applied: split,
            recomputed,
        });
    }

    if let RedistributionMode::HeadCompany(head) = mode {
        redistribute(&mut applied, head);
    }

    // ── Report ──

    let selected = |id: &str| company_filter.is_none_or(|ids| ids.iter().any(|f| f == id));
    let name_of = |id: &str| companies.get(id).map_or_else(|| id.to_string(), |c| c.name.clone());

    let mut rows: Vec<CompanyTotals> = allowed
        .iter()
        .filter(|(id, _)| selected(**id))
        .map(|(&id, a)| {
            let split = applied.get(id).copied().unwrap_or_default();
            CompanyTotals::build(id, &name_of(id), a, &split)
        })
        .collect();
    rows.sort_by(|a, b| a.company_name.cmp(&b.company_name).then(a.company_id.cmp(&b.company_id)));

    let mut grand_allowed = Allowed::default();
    let mut grand_applied = AppliedSplit::default();
    for (id, a) in allowed.iter().filter(|(id, _)| selected(**id)) {
        grand_allowed.add(a);
        grand_applied.add(&applied.get(id).copied().unwrap_or_default());
    }
    audit.retain(|row| selected(row.company_id.as_str()));

    info!(
        user,
        year = input.year,
        companies = rows.len(),
        applications = audit.len(),
        skipped,
        "aggregated usage space"
    );

    AggregationReport {
        year: input.year,
        mode: mode.clone(),
        companies: rows,
        totals: CompanyTotals::build("", "Totaal", &grand_allowed, &grand_applied),
        audit,
        skipped,
    }
}

/// Move all non-animal applied amounts into `head`.
fn redistribute(applied: &mut BTreeMap<&str, AppliedSplit>, head: &str) {
    let Some(head_key) = applied.keys().copied().find(|&k| k == head) else {
        warn!(head, "head company has no usage norms; redistribution skipped");
        return;
    };
    let (mut n_other, mut p2o5_other) = (0.0, 0.0);
    for split in applied.values_mut() {
        n_other += std::mem::take(&mut split.n_other);
        p2o5_other += std::mem::take(&mut split.p2o5_other);
    }
    if let Some(split) = applied.get_mut(head_key) {
        split.n_other = n_other;
        split.p2o5_other = p2o5_other;
    }
}
