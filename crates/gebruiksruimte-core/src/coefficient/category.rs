//! Fertiliser category mapping: free-text fertiliser name to regulatory category.

pub const LIQUID_PIG: &str = "Drijfmest van varkens";
pub const LIQUID_OTHER: &str = "Drijfmest van overige diersoorten";
pub const LIQUID_GRAZING_OWN: &str = "Drijfmest van graasdieren op het eigen bedrijf geproduceerd";
pub const LIQUID_GRAZING_SUPPLIED: &str = "Drijfmest van graasdieren aangevoerd";
pub const SOLID_GRAZING_OWN: &str = "Vaste mest van graasdieren op het eigen bedrijf geproduceerd";
pub const SOLID_GRAZING_SUPPLIED: &str = "Vaste mest van graasdieren aangevoerd";
pub const SOLID_PIG_POULTRY_MINK: &str = "Vaste mest van varkens, pluimvee en nertsen";
pub const SOLID_OTHER: &str = "Vaste mest van overige diersoorten";
pub const COMPOST: &str = "Compost";
pub const SEWAGE_SLUDGE: &str = "Zuiveringsslib";
pub const OTHER_ORGANIC: &str = "Overige organische meststoffen";
pub const MIXTURES: &str = "Mengsels van meststoffen";
pub const THIN_FRACTION: &str = "Dunne fractie na mestbewerking en gier";
pub const MUSHROOM_COMPOST: &str = "Champost";

const GRAZING_ANIMALS: &[&str] = &["geiten", "schapen", "rund"];
const SOLID_PIG_POULTRY_KEYWORDS: &[&str] = &["varken", "kippen", "pluimvee", "nertsen", "leghennen"];

/// Keywords that mark a category as animal-sourced.
const ANIMAL_KEYWORDS: &[&str] = &[
    "drijfmest",
    "vaste mest",
    "gier",
    "stal",
    "kip",
    "varkens",
    "rund",
    "geiten",
    "schapen",
    "pluimvee",
    "nertsen",
    "leghennen",
    "mest",
    "compost",
];

fn any_of(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

fn liquid(name: &str) -> bool {
    name.contains("drijfmest")
}

/// One `(predicate, label)` entry. Predicates see the lower-cased name.
pub struct CategoryRule {
    pub id: &'static str,
    applies: fn(&str) -> bool,
    label: fn(bool) -> &'static str,
}

impl CategoryRule {
    pub fn applies(&self, lower_name: &str) -> bool {
        (self.applies)(lower_name)
    }

    pub fn label(&self, own_farm: bool) -> &'static str {
        (self.label)(own_farm)
    }
}

/// Category rules in evaluation order. The first match wins.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        id: "liquid_pig",
        applies: |n| liquid(n) && n.contains("varkens"),
        label: |_| LIQUID_PIG,
    },
    CategoryRule {
        id: "liquid_other",
        applies: |n| liquid(n) && n.contains("overige"),
        label: |_| LIQUID_OTHER,
    },
    CategoryRule {
        id: "liquid_grazing",
        applies: |n| liquid(n) && any_of(n, GRAZING_ANIMALS),
        label: |own| {
            if own {
                LIQUID_GRAZING_OWN
            } else {
                LIQUID_GRAZING_SUPPLIED
            }
        },
    },
    CategoryRule {
        id: "solid_grazing",
        applies: |n| !liquid(n) && any_of(n, GRAZING_ANIMALS),
        label: |own| {
            if own {
                SOLID_GRAZING_OWN
            } else {
                SOLID_GRAZING_SUPPLIED
            }
        },
    },
    CategoryRule {
        id: "solid_pig_poultry_mink",
        applies: |n| !liquid(n) && any_of(n, SOLID_PIG_POULTRY_KEYWORDS),
        label: |_| SOLID_PIG_POULTRY_MINK,
    },
    CategoryRule {
        id: "solid_other",
        applies: |n| !liquid(n) && n.contains("overige"),
        label: |_| SOLID_OTHER,
    },
    CategoryRule {
        id: "compost",
        applies: |n| n.contains("compost"),
        label: |_| COMPOST,
    },
    CategoryRule {
        id: "sewage_sludge",
        applies: |n| n.contains("zuiveringsslib"),
        label: |_| SEWAGE_SLUDGE,
    },
    CategoryRule {
        id: "other_organic",
        applies: |n| n.contains("overige organische"),
        label: |_| OTHER_ORGANIC,
    },
    CategoryRule {
        id: "mixtures",
        applies: |n| n.contains("mengsel") || n.contains("meststoffen"),
        label: |_| MIXTURES,
    },
    CategoryRule {
        id: "thin_fraction",
        applies: |n| n.contains("dunne fractie") || n.contains("gier"),
        label: |_| THIN_FRACTION,
    },
    CategoryRule {
        id: "mushroom_compost",
        applies: |n| n.contains("champost"),
        label: |_| MUSHROOM_COMPOST,
    },
];

/// Map a fertiliser name to its category. Unmatched names pass through lower-cased.
pub fn map_category(fertilizer_name: &str, own_farm: bool) -> String {
    let lower = fertilizer_name.trim().to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.applies(&lower))
        .map(|rule| rule.label(own_farm).to_string())
        .unwrap_or(lower)
}

/// Whether a category counts as animal-sourced for coefficient lookup.
pub fn is_animal_category(category: &str) -> bool {
    any_of(&category.to_lowercase(), ANIMAL_KEYWORDS)
}
