//! Norm resolution: maximum legal nitrogen and phosphate per parcel, crop and year.
//!
//! Every lookup table is versioned by year. A request for year `y` uses the
//! most recent table year not after `y`, chosen independently per table, so the
//! crop table may resolve to 2024 while the phosphate table still resolves to
//! 2023.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::CallContext;
use crate::model::{CropNormRow, DerogationNormRow, Parcel, PhosphateNormRow};
use crate::NormError;

/// NV-area parcels get 80% of the crop nitrogen norm.
pub const NV_AREA_FACTOR: f64 = 0.8;

/// Rows carrying a table version year.
pub trait Versioned {
    fn year(&self) -> i32;
}

impl Versioned for CropNormRow {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Versioned for PhosphateNormRow {
    fn year(&self) -> i32 {
        self.year
    }
}

impl Versioned for DerogationNormRow {
    fn year(&self) -> i32 {
        self.year
    }
}

/// Highest year in `table` that is `<= year`.
pub fn best_year<T: Versioned>(table: &[T], year: i32) -> Option<i32> {
    table.iter().map(Versioned::year).filter(|&y| y <= year).max()
}

/// The three norm lookup tables, loaded once per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub crop_norms: Vec<CropNormRow>,
    pub phosphate_norms: Vec<PhosphateNormRow>,
    pub derogation_norms: Vec<DerogationNormRow>,
}

/// Soil categories of the crop nitrogen table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoilCategory {
    Clay,
    SandNorthWestCentral,
    SandSouth,
    Loess,
    Peat,
}

impl SoilCategory {
    /// Classify a free-text soil label. First matching keyword wins.
    pub fn classify(soil_type: &str) -> Option<Self> {
        let soil = soil_type.to_lowercase();
        if soil.contains("klei") {
            Some(Self::Clay)
        } else if soil.contains("noord") || soil.contains("west") || soil.contains("centraal") {
            Some(Self::SandNorthWestCentral)
        } else if soil.contains("zuid") {
            Some(Self::SandSouth)
        } else if soil.contains("löss") || soil.contains("loss") {
            Some(Self::Loess)
        } else if soil.contains("veen") {
            Some(Self::Peat)
        } else {
            None
        }
    }

    fn norm_of(self, row: &CropNormRow) -> Option<f64> {
        match self {
            Self::Clay => row.n_clay,
            Self::SandNorthWestCentral => row.n_sand_north_west_central,
            Self::SandSouth => row.n_sand_south,
            Self::Loess => row.n_loess,
            Self::Peat => row.n_peat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandType {
    Grassland,
    Arable,
}

impl LandType {
    pub fn of_crop(crop: &str) -> Self {
        if crop.to_lowercase().contains("gras") {
            Self::Grassland
        } else {
            Self::Arable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grassland => "grasland",
            Self::Arable => "bouwland",
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Inclusive range test that ignores the stored order of the bounds.
fn within(value: f64, a: f64, b: f64) -> bool {
    value >= a.min(b) && value <= a.max(b)
}

/// Total nitrogen norm (kg N/ha) for `crop` on `parcel`.
pub fn resolve_nitrogen_norm(
    ctx: &CallContext,
    tables: &ReferenceTables,
    crop: &str,
    parcel: &Parcel,
    year: i32,
) -> Option<f64> {
    let table_year = best_year(&tables.crop_norms, year)?;
    let row = tables
        .crop_norms
        .iter()
        .find(|r| r.year == table_year && r.crop == crop)?;
    let category = SoilCategory::classify(&parcel.soil_type)?;
    let mut norm = category.norm_of(row)?;
    if parcel.nv_area {
        norm *= NV_AREA_FACTOR;
    }
    debug!(
        user = ctx.effective_user(),
        crop,
        year,
        table_year,
        ?category,
        norm,
        "resolved nitrogen norm"
    );
    Some(round2(norm))
}

/// Phosphate norm (kg P2O5/ha) for `crop` on `parcel`.
///
/// When several ranges contain the parcel values the row with the lowest
/// P-CaCl2 start wins, then the lowest P-AL start.
pub fn resolve_phosphate_norm(
    ctx: &CallContext,
    tables: &ReferenceTables,
    parcel: &Parcel,
    crop: &str,
    year: i32,
) -> Option<f64> {
    let (p_al, p_cacl2) = (parcel.p_al?, parcel.p_cacl2?);
    let table_year = best_year(&tables.phosphate_norms, year)?;
    let land = LandType::of_crop(crop);

    let row = tables
        .phosphate_norms
        .iter()
        .filter(|r| r.year == table_year && r.land_type.eq_ignore_ascii_case(land.as_str()))
        .filter(|r| within(p_cacl2, r.p_cacl2_from, r.p_cacl2_to))
        .filter(|r| within(p_al, r.p_al_from, r.p_al_to))
        .min_by(|a, b| {
            a.p_cacl2_from
                .total_cmp(&b.p_cacl2_from)
                .then(a.p_al_from.total_cmp(&b.p_al_from))
        })?;

    debug!(
        user = ctx.effective_user(),
        crop,
        year,
        table_year,
        land = land.as_str(),
        norm = row.norm_kg_ha,
        "resolved phosphate norm"
    );
    Some(row.norm_kg_ha)
}

/// Nitrogen-from-animal-manure norm (kg N/ha).
///
/// Derogation only counts on grassland.
pub fn resolve_animal_nitrogen_norm(
    ctx: &CallContext,
    tables: &ReferenceTables,
    parcel: &Parcel,
    crop: &str,
    derogation: bool,
    year: i32,
) -> Option<f64> {
    let table_year = best_year(&tables.derogation_norms, year)?;
    let effective_derogation = derogation && LandType::of_crop(crop) == LandType::Grassland;
    let row = tables.derogation_norms.iter().find(|r| {
        r.year == table_year && r.nv_area == parcel.nv_area && r.derogation == effective_derogation
    })?;
    debug!(
        user = ctx.effective_user(),
        crop,
        year,
        table_year,
        effective_derogation,
        norm = row.n_animal_kg_ha,
        "resolved animal nitrogen norm"
    );
    Some(row.n_animal_kg_ha)
}

/// The three norms for one (parcel, crop, year), ready to persist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNorm {
    pub n_total_kg_ha: f64,
    pub n_animal_kg_ha: f64,
    pub p2o5_kg_ha: f64,
}

/// Resolve all three norms. The animal norm never exceeds the total norm.
///
/// A missing total-nitrogen or phosphate norm rejects the whole norm; a
/// missing animal norm counts as zero.
pub fn resolve_usage_norm(
    ctx: &CallContext,
    tables: &ReferenceTables,
    parcel: &Parcel,
    crop: &str,
    derogation: bool,
    year: i32,
) -> Result<ResolvedNorm, NormError> {
    let n_total = resolve_nitrogen_norm(ctx, tables, crop, parcel, year).ok_or_else(|| {
        NormError::NitrogenNormMissing {
            crop: crop.to_string(),
            year,
        }
    })?;
    let p2o5 = resolve_phosphate_norm(ctx, tables, parcel, crop, year).ok_or_else(|| {
        NormError::PhosphateNormMissing {
            crop: crop.to_string(),
            year,
        }
    })?;
    let n_animal =
        resolve_animal_nitrogen_norm(ctx, tables, parcel, crop, derogation, year).unwrap_or(0.0);

    Ok(ResolvedNorm {
        n_total_kg_ha: n_total,
        n_animal_kg_ha: n_animal.min(n_total),
        p2o5_kg_ha: p2o5,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop_row(year: i32, crop: &str) -> CropNormRow {
        CropNormRow {
            id: format!("{crop}-{year}"),
            year,
            crop: crop.into(),
            n_clay: Some(345.0),
            n_sand_north_west_central: Some(250.0),
            n_sand_south: Some(200.0),
            n_loess: Some(230.0),
            n_peat: Some(265.0),
        }
    }

    fn p_row(year: i32, land: &str, cacl2: (f64, f64), al: (f64, f64), norm: f64) -> PhosphateNormRow {
        PhosphateNormRow {
            year,
            land_type: land.into(),
            p_cacl2_from: cacl2.0,
            p_cacl2_to: cacl2.1,
            p_al_from: al.0,
            p_al_to: al.1,
            norm_kg_ha: norm,
            description: None,
        }
    }

    fn derog_row(year: i32, nv: bool, derog: bool, norm: f64) -> DerogationNormRow {
        DerogationNormRow {
            year,
            nv_area: nv,
            derogation: derog,
            n_animal_kg_ha: norm,
        }
    }

    fn parcel(soil: &str, nv: bool) -> Parcel {
        Parcel {
            id: "p1".into(),
            name: "Achter de schuur".into(),
            soil_type: soil.into(),
            p_al: Some(30.0),
            p_cacl2: Some(2.0),
            area_ha: Some(2.5),
            calculated_area_ha: None,
            nv_area: nv,
            user_id: "u1".into(),
        }
    }

    fn tables() -> ReferenceTables {
        ReferenceTables {
            crop_norms: vec![
                crop_row(2023, "Grasland met beweiden"),
                crop_row(2023, "Snijmais"),
            ],
            phosphate_norms: vec![
                p_row(2023, "grasland", (1.0, 3.0), (20.0, 40.0), 105.0),
                p_row(2023, "grasland", (3.1, 5.0), (41.0, 60.0), 80.0),
                p_row(2023, "bouwland", (1.0, 3.0), (20.0, 40.0), 75.0),
            ],
            derogation_norms: vec![
                derog_row(2023, false, false, 170.0),
                derog_row(2023, false, true, 200.0),
                derog_row(2023, true, false, 170.0),
                derog_row(2023, true, true, 190.0),
            ],
        }
    }

    fn ctx() -> CallContext {
        CallContext::new("u1")
    }

    #[test]
    fn best_year_falls_back_to_latest_earlier_year() {
        let rows = vec![crop_row(2021, "Snijmais")];
        assert_eq!(best_year(&rows, 2021), Some(2021));
        assert_eq!(best_year(&rows, 2030), Some(2021));
        assert_eq!(best_year(&rows, 2020), None);
    }

    #[test]
    fn best_year_is_independent_per_table() {
        let mut t = tables();
        t.crop_norms.push(crop_row(2024, "Snijmais"));
        assert_eq!(best_year(&t.crop_norms, 2024), Some(2024));
        assert_eq!(best_year(&t.phosphate_norms, 2024), Some(2023));
    }

    #[test]
    fn soil_keywords_first_match_wins() {
        assert_eq!(SoilCategory::classify("Zeeklei"), Some(SoilCategory::Clay));
        assert_eq!(
            SoilCategory::classify("Noordelijk, westelijk en centraal zand"),
            Some(SoilCategory::SandNorthWestCentral)
        );
        assert_eq!(SoilCategory::classify("Zuidelijk zand"), Some(SoilCategory::SandSouth));
        assert_eq!(SoilCategory::classify("Löss"), Some(SoilCategory::Loess));
        assert_eq!(SoilCategory::classify("Veen"), Some(SoilCategory::Peat));
        // "klei" outranks "veen" in a mixed label.
        assert_eq!(SoilCategory::classify("kleiig veen"), Some(SoilCategory::Clay));
        assert_eq!(SoilCategory::classify("onbekend"), None);
    }

    #[test]
    fn nitrogen_norm_by_soil_and_nv_area() {
        let t = tables();
        let clay = parcel("Klei", false);
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Snijmais", &clay, 2023), Some(345.0));

        let nv_sand = parcel("Zuidelijk zand", true);
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Snijmais", &nv_sand, 2023), Some(160.0));
    }

    #[test]
    fn nitrogen_norm_rounds_to_two_decimals() {
        let mut t = tables();
        t.crop_norms[1].n_peat = Some(123.456);
        let nv_peat = parcel("Veen", true);
        // 123.456 * 0.8 = 98.7648
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Snijmais", &nv_peat, 2023), Some(98.76));
    }

    #[test]
    fn nitrogen_norm_missing_for_unknown_soil_or_crop() {
        let t = tables();
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Snijmais", &parcel("grind", false), 2023), None);
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Tulpen", &parcel("Klei", false), 2023), None);
        assert_eq!(resolve_nitrogen_norm(&ctx(), &t, "Snijmais", &parcel("Klei", false), 2022), None);
    }

    #[test]
    fn phosphate_matches_containing_range_only() {
        let t = tables();
        let p = parcel("Klei", false);
        assert_eq!(
            resolve_phosphate_norm(&ctx(), &t, &p, "Grasland met beweiden", 2023),
            Some(105.0)
        );
        assert_eq!(resolve_phosphate_norm(&ctx(), &t, &p, "Snijmais", 2023), Some(75.0));
    }

    #[test]
    fn phosphate_ranges_are_direction_agnostic() {
        let t = ReferenceTables {
            phosphate_norms: vec![p_row(2023, "grasland", (3.0, 1.0), (40.0, 20.0), 105.0)],
            ..Default::default()
        };
        let p = parcel("Klei", false);
        assert_eq!(resolve_phosphate_norm(&ctx(), &t, &p, "Gras", 2023), Some(105.0));
    }

    #[test]
    fn phosphate_tie_break_by_lowest_range_start() {
        let t = ReferenceTables {
            phosphate_norms: vec![
                p_row(2023, "grasland", (1.5, 3.0), (20.0, 40.0), 90.0),
                p_row(2023, "grasland", (1.0, 3.0), (25.0, 40.0), 100.0),
                p_row(2023, "grasland", (1.0, 3.0), (20.0, 40.0), 105.0),
            ],
            ..Default::default()
        };
        let p = parcel("Klei", false);
        assert_eq!(resolve_phosphate_norm(&ctx(), &t, &p, "Gras", 2023), Some(105.0));
    }

    #[test]
    fn phosphate_none_without_soil_test() {
        let t = tables();
        let mut p = parcel("Klei", false);
        p.p_al = None;
        assert_eq!(resolve_phosphate_norm(&ctx(), &t, &p, "Gras", 2023), None);

        let mut outside = parcel("Klei", false);
        outside.p_al = Some(99.0);
        assert_eq!(resolve_phosphate_norm(&ctx(), &t, &outside, "Gras", 2023), None);
    }

    #[test]
    fn derogation_only_on_grassland() {
        let t = tables();
        let p = parcel("Klei", false);
        assert_eq!(
            resolve_animal_nitrogen_norm(&ctx(), &t, &p, "Grasland met beweiden", true, 2023),
            Some(200.0)
        );
        assert_eq!(
            resolve_animal_nitrogen_norm(&ctx(), &t, &p, "Snijmais", true, 2023),
            Some(170.0)
        );
        let nv = parcel("Klei", true);
        assert_eq!(
            resolve_animal_nitrogen_norm(&ctx(), &t, &nv, "Grasland met beweiden", true, 2023),
            Some(190.0)
        );
    }

    #[test]
    fn usage_norm_requires_nitrogen_and_phosphate() {
        let t = tables();
        let unknown_soil = parcel("grind", false);
        assert_eq!(
            resolve_usage_norm(&ctx(), &t, &unknown_soil, "Snijmais", false, 2023),
            Err(NormError::NitrogenNormMissing {
                crop: "Snijmais".into(),
                year: 2023
            })
        );

        let mut no_p = parcel("Klei", false);
        no_p.p_cacl2 = None;
        assert!(matches!(
            resolve_usage_norm(&ctx(), &t, &no_p, "Snijmais", false, 2023),
            Err(NormError::PhosphateNormMissing { .. })
        ));
    }

    #[test]
    fn missing_animal_norm_degrades_to_zero() {
        let mut t = tables();
        t.derogation_norms.clear();
        let norm = resolve_usage_norm(&ctx(), &t, &parcel("Klei", false), "Snijmais", false, 2023)
            .unwrap();
        assert_eq!(norm.n_animal_kg_ha, 0.0);
        assert_eq!(norm.n_total_kg_ha, 345.0);
    }

    #[test]
    fn animal_norm_clamped_to_total() {
        let t = tables();
        // NV-area south sand: 200 * 0.8 = 160 total, animal table says 170.
        let p = parcel("Zuidelijk zand", true);
        let norm = resolve_usage_norm(&ctx(), &t, &p, "Snijmais", false, 2023).unwrap();
        assert_eq!(norm.n_total_kg_ha, 160.0);
        assert_eq!(norm.n_animal_kg_ha, 160.0);
    }

    #[test]
    fn clamp_holds_across_generated_inputs() {
        let t = tables();
        let soils = ["Klei", "Noord zand", "Zuidelijk zand", "Löss", "Veen"];
        let crops = ["Grasland met beweiden", "Snijmais"];
        for soil in soils {
            for nv in [false, true] {
                for crop in crops {
                    for derog in [false, true] {
                        for year in 2023..2027 {
                            let p = parcel(soil, nv);
                            if let Ok(n) = resolve_usage_norm(&ctx(), &t, &p, crop, derog, year) {
                                assert!(n.n_animal_kg_ha <= n.n_total_kg_ha, "{soil} {crop} {year}");
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let t = tables();
        let p = parcel("Veen", true);
        let a = resolve_usage_norm(&ctx(), &t, &p, "Grasland met beweiden", true, 2025).unwrap();
        let b = resolve_usage_norm(&ctx(), &t, &p, "Grasland met beweiden", true, 2025).unwrap();
        assert_eq!(a.n_total_kg_ha.to_bits(), b.n_total_kg_ha.to_bits());
        assert_eq!(a.n_animal_kg_ha.to_bits(), b.n_animal_kg_ha.to_bits());
        assert_eq!(a.p2o5_kg_ha.to_bits(), b.p2o5_kg_ha.to_bits());
    }
}
