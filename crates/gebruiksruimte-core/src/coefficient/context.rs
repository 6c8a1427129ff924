//! Application-context derivation (the "toepassing" a coefficient row is keyed on).

use super::category::{
    LIQUID_GRAZING_OWN, LIQUID_PIG, SOLID_GRAZING_OWN, SOLID_GRAZING_SUPPLIED, SOLID_OTHER,
    SOLID_PIG_POULTRY_MINK, THIN_FRACTION,
};

pub const WITH_GRAZING: &str = "Op bedrijf met beweiding";
pub const WITHOUT_GRAZING: &str = "Op bedrijf zonder beweiding";
pub const ON_CLAY_PEAT: &str = "Op klei en veen";
pub const ON_SAND_LOESS: &str = "Op zand en löss";
pub const AUTUMN_CLAY_PEAT: &str = "Op bouwland op klei en veen, van 1 september t/m 31 januari";
pub const OTHER_WITH_GRAZING: &str = "Overige toepassingen op bedrijf met beweiding";
pub const OTHER_WITHOUT_GRAZING: &str = "Overige toepassingen op bedrijf zonder beweiding";
pub const OTHER_USES: &str = "Overige toepassingen";

/// Months counted as the autumn/winter spreading window (September through January).
const AUTUMN_MONTHS: [u32; 5] = [9, 10, 11, 12, 1];

/// Facts about an application that context rules inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Situation<'a> {
    pub category: &'a str,
    pub grazing: bool,
    pub clay_or_peat: bool,
    pub sand_or_loess: bool,
    pub autumn: bool,
}

impl<'a> Situation<'a> {
    pub fn new(category: &'a str, crop: &str, soil_type: &str, month: u32) -> Self {
        let crop = crop.to_lowercase();
        let soil = soil_type.to_lowercase();
        Self {
            category,
            grazing: crop.contains("met beweiden"),
            clay_or_peat: soil.contains("klei") || soil.contains("veen"),
            sand_or_loess: soil.contains("zand") || soil.contains("löss") || soil.contains("loss"),
            autumn: AUTUMN_MONTHS.contains(&month),
        }
    }

    fn autumn_on_clay_or_peat(&self) -> bool {
        self.autumn && self.clay_or_peat
    }
}

pub struct ContextRule {
    pub id: &'static str,
    applies: fn(&Situation) -> bool,
    label: fn(&Situation) -> &'static str,
}

impl ContextRule {
    pub fn applies(&self, s: &Situation) -> bool {
        (self.applies)(s)
    }

    pub fn label(&self, s: &Situation) -> &'static str {
        (self.label)(s)
    }
}

pub const CONTEXT_RULES: &[ContextRule] = &[
    ContextRule {
        id: "own_liquid_grazing",
        applies: |s| s.category == LIQUID_GRAZING_OWN,
        label: |s| if s.grazing { WITH_GRAZING } else { WITHOUT_GRAZING },
    },
    ContextRule {
        id: "soil_bound_liquid",
        applies: |s| s.category == LIQUID_PIG || s.category == THIN_FRACTION,
        label: |s| {
            if s.clay_or_peat {
                ON_CLAY_PEAT
            } else if s.sand_or_loess {
                ON_SAND_LOESS
            } else {
                ""
            }
        },
    },
    ContextRule {
        id: "own_solid_grazing",
        applies: |s| s.category == SOLID_GRAZING_OWN,
        label: |s| {
            if s.autumn_on_clay_or_peat() {
                AUTUMN_CLAY_PEAT
            } else if s.grazing {
                OTHER_WITH_GRAZING
            } else {
                OTHER_WITHOUT_GRAZING
            }
        },
    },
    ContextRule {
        id: "other_solid",
        applies: |s| {
            [SOLID_GRAZING_SUPPLIED, SOLID_PIG_POULTRY_MINK, SOLID_OTHER].contains(&s.category)
        },
        label: |s| {
            if s.autumn_on_clay_or_peat() {
                AUTUMN_CLAY_PEAT
            } else {
                OTHER_USES
            }
        },
    },
];

/// Derive the application context for a category. Empty when no rule applies.
pub fn derive_context(category: &str, crop: &str, soil_type: &str, month: u32) -> String {
    let situation = Situation::new(category, crop, soil_type, month);
    CONTEXT_RULES
        .iter()
        .find(|rule| rule.applies(&situation))
        .map(|rule| rule.label(&situation).to_string())
        .unwrap_or_default()
}
