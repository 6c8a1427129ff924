//! Entities and reference rows shared by the resolvers and the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Declared application type of fertilisers made from animal manure.
pub const ANIMAL_MANURE_TYPE: &str = "dierlijke mest";
/// Declared application type of mineral fertilisers.
pub const MINERAL_TYPE: &str = "kunstmest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub place: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    pub name: String,
    /// Free-text soil label, e.g. "Zuidelijk zand" or "Zeeklei".
    pub soil_type: String,
    pub p_al: Option<f64>,
    pub p_cacl2: Option<f64>,
    /// Registered area in hectares.
    pub area_ha: Option<f64>,
    /// Area computed from the parcel polygon, preferred when present.
    pub calculated_area_ha: Option<f64>,
    pub nv_area: bool,
    pub user_id: String,
}

impl Parcel {
    /// Area used for scaling per-hectare amounts. Zero or negative areas
    /// count as absent.
    pub fn effective_area(&self) -> f64 {
        let positive = |a: &f64| *a > 0.0;
        self.calculated_area_ha
            .filter(positive)
            .or(self.area_ha.filter(positive))
            .unwrap_or(0.0)
    }
}

/// Nitrogen norms for one crop in one year, per soil category (kg N/ha).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropNormRow {
    pub id: String,
    pub year: i32,
    pub crop: String,
    pub n_clay: Option<f64>,
    pub n_sand_north_west_central: Option<f64>,
    pub n_sand_south: Option<f64>,
    pub n_loess: Option<f64>,
    pub n_peat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhosphateNormRow {
    pub year: i32,
    /// `grasland` or `bouwland`.
    pub land_type: String,
    pub p_cacl2_from: f64,
    pub p_cacl2_to: f64,
    pub p_al_from: f64,
    pub p_al_to: f64,
    pub norm_kg_ha: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerogationNormRow {
    pub year: i32,
    pub nv_area: bool,
    pub derogation: bool,
    pub n_animal_kg_ha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fertilizer {
    pub id: String,
    pub name: String,
    /// Declared application type, e.g. [`ANIMAL_MANURE_TYPE`] or [`MINERAL_TYPE`].
    pub application_type: String,
    pub n_pct: Option<f64>,
    pub p2o5_pct: Option<f64>,
    pub k2o_pct: Option<f64>,
}

impl Fertilizer {
    pub fn is_animal_manure(&self) -> bool {
        self.application_type.trim().eq_ignore_ascii_case(ANIMAL_MANURE_TYPE)
    }
}

/// Resolved maximum application for one (parcel, crop, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageNorm {
    pub id: String,
    pub company_id: String,
    pub parcel_id: String,
    pub crop_id: String,
    pub year: i32,
    pub n_total_kg_ha: f64,
    pub n_animal_kg_ha: f64,
    pub p2o5_kg_ha: f64,
    pub derogation: bool,
    pub user_id: String,
}

/// Per-hectare nutrient amounts as applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAmounts {
    pub n: f64,
    pub p2o5: f64,
    pub k2o: f64,
}

/// Per-hectare amounts after working coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectiveAmounts {
    pub n: f64,
    pub n_animal: f64,
    pub p2o5: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub usage_norm_id: String,
    /// Company recorded on the application itself. Aggregation ignores it in
    /// favour of the usage norm's company.
    pub company_id: String,
    pub parcel_id: String,
    pub fertilizer_id: String,
    pub date: NaiveDate,
    pub quantity_kg_ha: f64,
    pub raw: RawAmounts,
    /// `None` for legacy rows written before effective amounts were stored.
    pub effective: Option<EffectiveAmounts>,
    pub coefficient_pct: Option<f64>,
    pub context: Option<String>,
    pub category: Option<String>,
    pub own_farm: bool,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcel(area_ha: Option<f64>, calculated_area_ha: Option<f64>) -> Parcel {
        Parcel {
            id: "p1".into(),
            name: "Kamp 1".into(),
            soil_type: "Zeeklei".into(),
            p_al: None,
            p_cacl2: None,
            area_ha,
            calculated_area_ha,
            nv_area: false,
            user_id: "u1".into(),
        }
    }

    #[test]
    fn calculated_area_preferred_when_positive() {
        assert_eq!(parcel(Some(2.0), Some(1.8)).effective_area(), 1.8);
        assert_eq!(parcel(Some(2.0), None).effective_area(), 2.0);
    }

    #[test]
    fn zero_calculated_area_falls_back_to_registered() {
        assert_eq!(parcel(Some(2.0), Some(0.0)).effective_area(), 2.0);
        assert_eq!(parcel(Some(2.0), Some(-1.0)).effective_area(), 2.0);
        assert_eq!(parcel(Some(0.0), Some(0.0)).effective_area(), 0.0);
        assert_eq!(parcel(None, None).effective_area(), 0.0);
    }
}
