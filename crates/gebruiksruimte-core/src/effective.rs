//! Raw and effective per-hectare nutrient amounts for an application.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::coefficient::{CoefficientInput, CoefficientOutcome, CoefficientTable, resolve_coefficient};
use crate::context::CallContext;
use crate::model::{EffectiveAmounts, Fertilizer, RawAmounts};

/// Per-hectare amounts as applied.
///
/// Animal manure varies per load, so its amounts are always entered by hand.
/// Other fertilisers derive them from the catalogue percentages unless the
/// user overrides them.
pub fn raw_amounts(fertilizer: &Fertilizer, quantity_kg_ha: f64, manual: Option<RawAmounts>) -> RawAmounts {
    if fertilizer.is_animal_manure() {
        return manual.unwrap_or_default();
    }
    manual.unwrap_or_else(|| {
        let share = |pct: Option<f64>| quantity_kg_ha * pct.unwrap_or(0.0) / 100.0;
        RawAmounts {
            n: share(fertilizer.n_pct),
            p2o5: share(fertilizer.p2o5_pct),
            k2o: share(fertilizer.k2o_pct),
        }
    })
}

/// Apply a working coefficient to raw amounts. Phosphate always counts fully.
pub fn effective_amounts(fertilizer: &Fertilizer, raw: RawAmounts, coefficient_pct: f64) -> EffectiveAmounts {
    let n = raw.n * coefficient_pct / 100.0;
    EffectiveAmounts {
        n,
        n_animal: if fertilizer.is_animal_manure() { n } else { 0.0 },
        p2o5: raw.p2o5,
    }
}

/// What the coefficient depends on besides the fertiliser itself.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationFacts<'a> {
    pub fertilizer: &'a Fertilizer,
    pub raw: RawAmounts,
    pub own_farm: bool,
    pub crop: &'a str,
    pub soil_type: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub amounts: EffectiveAmounts,
    pub coefficient: CoefficientOutcome,
}

/// Effective amounts for an application on `date`.
pub fn evaluate_at(
    ctx: &CallContext,
    table: &CoefficientTable,
    facts: &ApplicationFacts,
    date: NaiveDate,
) -> Effect {
    let outcome = resolve_coefficient(
        ctx,
        table,
        &CoefficientInput {
            fertilizer_name: &facts.fertilizer.name,
            application_type: &facts.fertilizer.application_type,
            own_farm: facts.own_farm,
            crop: facts.crop,
            soil_type: facts.soil_type,
            month: date.month(),
            year: date.year(),
        },
    );
    Effect {
        amounts: effective_amounts(facts.fertilizer, facts.raw, outcome.percent),
        coefficient: outcome,
    }
}
