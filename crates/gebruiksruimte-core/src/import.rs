//! Batch creation of usage norms from tabular rows.
//!
//! Each row is resolved on its own. A bad row never aborts the batch; it is
//! reported back with the reason it was skipped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::CallContext;
use crate::error::NormError;
use crate::model::{Company, CropNormRow, Parcel};
use crate::norms::{ReferenceTables, ResolvedNorm, resolve_usage_norm};

/// One input row: names as a user would type them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub company: String,
    pub parcel: String,
    pub crop: String,
    pub year: Option<i32>,
    pub derogation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingData,
    NoMatch,
    NormMissing(String),
    AlreadyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingData => write!(f, "missing data"),
            Self::NoMatch => write!(f, "no matching company, parcel or crop"),
            Self::NormMissing(detail) => write!(f, "{detail}"),
            Self::AlreadyExists => write!(f, "usage norm already exists"),
        }
    }
}

impl From<NormError> for SkipReason {
    fn from(e: NormError) -> Self {
        Self::NormMissing(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: ImportRow,
    pub reason: SkipReason,
}

/// A row that resolved cleanly and can be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedNorm {
    pub row: ImportRow,
    pub company_id: String,
    pub parcel_id: String,
    pub crop_id: String,
    pub year: i32,
    pub derogation: bool,
    pub norm: ResolvedNorm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPlan {
    pub accepted: Vec<PlannedNorm>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

/// The crop row a name refers to in `year`: the latest table year not after it.
pub fn find_crop<'a>(crops: &'a [CropNormRow], name: &str, year: i32) -> Option<&'a CropNormRow> {
    crops
        .iter()
        .filter(|c| c.crop == name && c.year <= year)
        .max_by_key(|c| c.year)
}

/// Resolve every row against the effective user's companies and parcels.
pub fn plan_import(
    ctx: &CallContext,
    rows: &[ImportRow],
    companies: &[Company],
    parcels: &[Parcel],
    tables: &ReferenceTables,
) -> ImportPlan {
    let user = ctx.effective_user();
    let mut plan = ImportPlan::default();

    for row in rows {
        match plan_row(ctx, row, user, companies, parcels, tables) {
            Ok(planned) => plan.accepted.push(planned),
            Err(reason) => {
                debug!(company = %row.company, parcel = %row.parcel, crop = %row.crop, %reason, "import row skipped");
                plan.skipped.push(SkippedRow {
                    row: row.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        user,
        accepted = plan.accepted.len(),
        skipped = plan.skipped.len(),
        "planned usage-norm import"
    );
    plan
}

fn plan_row(
    ctx: &CallContext,
    row: &ImportRow,
    user: &str,
    companies: &[Company],
    parcels: &[Parcel],
    tables: &ReferenceTables,
) -> Result<PlannedNorm, SkipReason> {
    let (company, parcel, crop) = (row.company.trim(), row.parcel.trim(), row.crop.trim());
    let year = match row.year {
        Some(y) if !company.is_empty() && !parcel.is_empty() && !crop.is_empty() => y,
        _ => return Err(SkipReason::MissingData),
    };

    let company = companies
        .iter()
        .find(|c| c.user_id == user && c.name == company)
        .ok_or(SkipReason::NoMatch)?;
    let parcel = parcels
        .iter()
        .find(|p| p.user_id == user && p.name == parcel)
        .ok_or(SkipReason::NoMatch)?;
    let crop = find_crop(&tables.crop_norms, crop, year).ok_or(SkipReason::NoMatch)?;

    let norm = resolve_usage_norm(ctx, tables, parcel, &crop.crop, row.derogation, year)?;
    Ok(PlannedNorm {
        row: row.clone(),
        company_id: company.id.clone(),
        parcel_id: parcel.id.clone(),
        crop_id: crop.id.clone(),
        year,
        derogation: row.derogation,
        norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DerogationNormRow, PhosphateNormRow};

    fn tables() -> ReferenceTables {
        ReferenceTables {
            crop_norms: vec![CropNormRow {
                id: "gras-2023".into(),
                year: 2023,
                crop: "Grasland met beweiden".into(),
                n_clay: Some(345.0),
                n_sand_north_west_central: Some(250.0),
                n_sand_south: Some(250.0),
                n_loess: Some(250.0),
                n_peat: Some(265.0),
            }],
            phosphate_norms: vec![PhosphateNormRow {
                year: 2023,
                land_type: "grasland".into(),
                p_cacl2_from: 0.0,
                p_cacl2_to: 5.0,
                p_al_from: 0.0,
                p_al_to: 60.0,
                norm_kg_ha: 105.0,
                description: None,
            }],
            derogation_norms: vec![DerogationNormRow {
                year: 2023,
                nv_area: false,
                derogation: true,
                n_animal_kg_ha: 200.0,
            }],
        }
    }

    fn companies() -> Vec<Company> {
        vec![Company {
            id: "c1".into(),
            name: "De Hoeve".into(),
            place: Some("Zwolle".into()),
            user_id: "u1".into(),
        }]
    }

    fn parcels() -> Vec<Parcel> {
        vec![Parcel {
            id: "p1".into(),
            name: "Kamp 1".into(),
            soil_type: "Klei".into(),
            p_al: Some(30.0),
            p_cacl2: Some(2.0),
            area_ha: Some(4.0),
            calculated_area_ha: None,
            nv_area: false,
            user_id: "u1".into(),
        }]
    }

    fn row(company: &str, parcel: &str, crop: &str, year: Option<i32>) -> ImportRow {
        ImportRow {
            company: company.into(),
            parcel: parcel.into(),
            crop: crop.into(),
            year,
            derogation: true,
        }
    }

    #[test]
    fn resolves_good_rows_and_skips_bad_ones() {
        let rows = vec![
            row("De Hoeve", "Kamp 1", "Grasland met beweiden", Some(2024)),
            row("", "Kamp 1", "Grasland met beweiden", Some(2024)),
            row("De Hoeve", "Kamp 1", "Grasland met beweiden", None),
            row("Onbekend", "Kamp 1", "Grasland met beweiden", Some(2024)),
            row("De Hoeve", "Kamp 1", "Grasland met beweiden", Some(2022)),
        ];
        let plan = plan_import(&CallContext::new("u1"), &rows, &companies(), &parcels(), &tables());

        assert_eq!(plan.accepted.len(), 1);
        let accepted = &plan.accepted[0];
        assert_eq!(accepted.crop_id, "gras-2023");
        assert_eq!(accepted.year, 2024);
        assert_eq!(accepted.norm.n_total_kg_ha, 345.0);
        assert_eq!(accepted.norm.n_animal_kg_ha, 200.0);

        let reasons: Vec<_> = plan.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::MissingData,
                SkipReason::MissingData,
                SkipReason::NoMatch,
                SkipReason::NoMatch
            ]
        );
    }

    #[test]
    fn missing_phosphate_norm_is_reported() {
        let mut p = parcels();
        p[0].p_al = None;
        let rows = vec![row("De Hoeve", "Kamp 1", "Grasland met beweiden", Some(2023))];
        let plan = plan_import(&CallContext::new("u1"), &rows, &companies(), &p, &tables());
        assert!(plan.accepted.is_empty());
        assert!(matches!(plan.skipped[0].reason, SkipReason::NormMissing(_)));
        assert!(plan.skipped[0].reason.to_string().contains("phosphate"));
    }

    #[test]
    fn impersonation_scopes_entity_matching() {
        let rows = vec![row("De Hoeve", "Kamp 1", "Grasland met beweiden", Some(2023))];
        let admin = CallContext::new("admin");
        let plan = plan_import(&admin, &rows, &companies(), &parcels(), &tables());
        assert_eq!(plan.skipped[0].reason, SkipReason::NoMatch);

        let acting = CallContext::impersonating("admin", "u1");
        let plan = plan_import(&acting, &rows, &companies(), &parcels(), &tables());
        assert_eq!(plan.accepted.len(), 1);
    }

    #[test]
    fn crop_lookup_uses_latest_year_not_after() {
        let mut crops = tables().crop_norms;
        let mut newer = crops[0].clone();
        newer.id = "gras-2025".into();
        newer.year = 2025;
        crops.push(newer);
        assert_eq!(find_crop(&crops, "Grasland met beweiden", 2024).unwrap().id, "gras-2023");
        assert_eq!(find_crop(&crops, "Grasland met beweiden", 2026).unwrap().id, "gras-2025");
        assert!(find_crop(&crops, "Grasland met beweiden", 2020).is_none());
    }
}
