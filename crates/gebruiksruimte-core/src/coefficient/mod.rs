//! Working-coefficient resolution.
//!
//! A fertiliser application counts toward the nitrogen totals only for the
//! fraction given by its working coefficient. The coefficient depends on the
//! fertiliser category (derived from its name), the application context
//! (crop, soil and month) and the year.

pub mod category;
pub mod context;
pub mod table;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::model::MINERAL_TYPE;

pub use category::{is_animal_category, map_category};
pub use context::derive_context;
pub use table::{
    CoefficientBackend, CoefficientRow, CoefficientSchema, CoefficientTable, InMemoryBackend,
    normalize_context,
};

/// Coefficient for mineral fertilisers and non-animal products.
pub const FULL_EFFECT_PCT: f64 = 100.0;
/// Coefficient for animal-sourced products with no table row.
pub const DEFAULT_ANIMAL_PCT: f64 = 65.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoefficientInput<'a> {
    pub fertilizer_name: &'a str,
    pub application_type: &'a str,
    pub own_farm: bool,
    pub crop: &'a str,
    pub soil_type: &'a str,
    /// Month of the application date, 1..=12.
    pub month: u32,
    pub year: i32,
}

impl CoefficientInput<'_> {
    fn is_mineral(&self) -> bool {
        self.application_type.trim().eq_ignore_ascii_case(MINERAL_TYPE)
            || self.fertilizer_name.to_lowercase().contains(MINERAL_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientOutcome {
    pub percent: f64,
    pub context: String,
    pub category: String,
}

/// Resolve the working coefficient for one application.
pub fn resolve_coefficient(
    ctx: &CallContext,
    table: &CoefficientTable,
    input: &CoefficientInput,
) -> CoefficientOutcome {
    let category = map_category(input.fertilizer_name, input.own_farm);
    let context = derive_context(&category, input.crop, input.soil_type, input.month);

    let percent = if input.is_mineral() {
        FULL_EFFECT_PCT
    } else if is_animal_category(&category) {
        table
            .lookup(input.year, &category, &context)
            .unwrap_or_else(|| {
                warn!(
                    user = ctx.effective_user(),
                    category = %category,
                    context = %context,
                    year = input.year,
                    "no working coefficient row; using default"
                );
                DEFAULT_ANIMAL_PCT
            })
    } else {
        FULL_EFFECT_PCT
    };

    debug!(
        user = ctx.effective_user(),
        fertilizer = input.fertilizer_name,
        category = %category,
        context = %context,
        percent,
        "resolved working coefficient"
    );
    CoefficientOutcome {
        percent,
        context,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallContext {
        CallContext::new("u1")
    }

    fn input<'a>(name: &'a str, kind: &'a str, crop: &'a str, soil: &'a str) -> CoefficientInput<'a> {
        CoefficientInput {
            fertilizer_name: name,
            application_type: kind,
            own_farm: false,
            crop,
            soil_type: soil,
            month: 4,
            year: 2024,
        }
    }

    fn table() -> CoefficientTable {
        CoefficientTable::new(
            CoefficientSchema::Current,
            vec![
                CoefficientRow::new(
                    None,
                    category::LIQUID_GRAZING_OWN,
                    Some(context::WITH_GRAZING),
                    45.0,
                ),
                CoefficientRow::new(None, category::LIQUID_PIG, Some(context::ON_CLAY_PEAT), 60.0),
            ],
        )
    }

    #[test]
    fn mineral_fertiliser_always_full() {
        let t = table();
        for (kind, crop, soil) in [
            ("kunstmest", "Snijmais", "Klei"),
            ("dierlijke mest", "Gras met beweiden", "Zand"),
            ("", "", ""),
        ] {
            let out = resolve_coefficient(&ctx(), &t, &input("Kunstmest NPK 12-10-18", kind, crop, soil));
            assert_eq!(out.percent, 100.0);
        }
        let declared = resolve_coefficient(&ctx(), &t, &input("KAS 27%", "Kunstmest", "", ""));
        assert_eq!(declared.percent, 100.0);
        assert_eq!(declared.category, "kas 27%");
    }

    #[test]
    fn own_farm_cattle_slurry_on_grazed_grass() {
        let mut i = input("Drijfmest rundvee", "dierlijke mest", "Gras met beweiden", "Zand");
        i.own_farm = true;
        let out = resolve_coefficient(&ctx(), &table(), &i);
        assert_eq!(out.category, category::LIQUID_GRAZING_OWN);
        assert_eq!(out.context, context::WITH_GRAZING);
        assert_eq!(out.percent, 45.0);
    }

    #[test]
    fn animal_without_row_defaults_to_65() {
        let out = resolve_coefficient(
            &ctx(),
            &CoefficientTable::default(),
            &input("Vaste mest varken", "dierlijke mest", "Snijmais", "Klei"),
        );
        assert_eq!(out.category, category::SOLID_PIG_POULTRY_MINK);
        assert_eq!(out.context, context::OTHER_USES);
        assert_eq!(out.percent, DEFAULT_ANIMAL_PCT);
    }

    #[test]
    fn table_lookup_for_pig_slurry_on_clay() {
        let out = resolve_coefficient(
            &ctx(),
            &table(),
            &input("Drijfmest varkens", "dierlijke mest", "Snijmais", "Zeeklei"),
        );
        assert_eq!(out.context, context::ON_CLAY_PEAT);
        assert_eq!(out.percent, 60.0);
    }

    #[test]
    fn non_animal_products_count_fully() {
        let out = resolve_coefficient(
            &ctx(),
            &table(),
            &input("Zuiveringsslib", "overig", "Snijmais", "Klei"),
        );
        assert_eq!(out.category, category::SEWAGE_SLUDGE);
        assert_eq!(out.percent, 100.0);
    }
}
