/// Arrow schema definitions for the administrator-managed reference tables.
///
/// Parquet/CSV imports are checked against these before loading, and the store
/// derives its `CREATE TABLE` statements from them.
pub mod reference {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const CROP_NORMS: &str = "crop_norms";
    pub const PHOSPHATE_NORMS: &str = "phosphate_norms";
    pub const DEROGATION_NORMS: &str = "derogation_norms";
    pub const LEGACY_COEFFICIENTS: &str = "legacy_nitrogen_coefficients";
    pub const WORKING_COEFFICIENTS: &str = "working_coefficients";

    /// Nitrogen norm per crop, year and soil category.
    pub fn crop_norm_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("crop", DataType::Utf8, false),
            Field::new("n_clay", DataType::Float64, true),
            Field::new("n_sand_north_west_central", DataType::Float64, true),
            Field::new("n_sand_south", DataType::Float64, true),
            Field::new("n_loess", DataType::Float64, true),
            Field::new("n_peat", DataType::Float64, true),
        ])
    }

    /// Phosphate norm ranges. Bounds may be stored in either order.
    pub fn phosphate_norm_schema() -> Schema {
        Schema::new(vec![
            Field::new("year", DataType::Int32, false),
            Field::new("land_type", DataType::Utf8, false),
            Field::new("p_cacl2_from", DataType::Float64, false),
            Field::new("p_cacl2_to", DataType::Float64, false),
            Field::new("p_al_from", DataType::Float64, false),
            Field::new("p_al_to", DataType::Float64, false),
            Field::new("norm_kg_ha", DataType::Float64, false),
            Field::new("description", DataType::Utf8, true),
        ])
    }

    /// Animal-manure nitrogen norm by NV-area and derogation.
    pub fn derogation_norm_schema() -> Schema {
        Schema::new(vec![
            Field::new("year", DataType::Int32, false),
            Field::new("nv_area", DataType::Boolean, false),
            Field::new("derogation", DataType::Boolean, false),
            Field::new("n_animal_kg_ha", DataType::Float64, false),
        ])
    }

    /// Year-keyed working coefficients (older schema).
    pub fn legacy_coefficient_schema() -> Schema {
        Schema::new(vec![
            Field::new("year", DataType::Int32, false),
            Field::new("fertilizer", DataType::Utf8, false),
            Field::new("context", DataType::Utf8, true),
            Field::new("pct", DataType::Float64, false),
        ])
    }

    /// Year-independent working coefficients.
    pub fn working_coefficient_schema() -> Schema {
        Schema::new(vec![
            Field::new("fertilizer", DataType::Utf8, false),
            Field::new("context", DataType::Utf8, true),
            Field::new("pct", DataType::Float64, false),
        ])
    }

    /// All reference tables with their schemas, in load order.
    pub fn all() -> Vec<(&'static str, Schema)> {
        vec![
            (CROP_NORMS, crop_norm_schema()),
            (PHOSPHATE_NORMS, phosphate_norm_schema()),
            (DEROGATION_NORMS, derogation_norm_schema()),
            (LEGACY_COEFFICIENTS, legacy_coefficient_schema()),
            (WORKING_COEFFICIENTS, working_coefficient_schema()),
        ]
    }

    /// Names of columns in `expected` that `actual` lacks.
    pub fn missing_columns(expected: &Schema, actual: &Schema) -> Vec<String> {
        expected
            .fields()
            .iter()
            .filter(|f| actual.field_with_name(f.name()).is_err())
            .map(|f| f.name().clone())
            .collect()
    }
}
