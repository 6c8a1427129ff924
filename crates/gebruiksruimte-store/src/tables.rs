//! Table layouts for user-owned entities, plus DDL generation from Arrow schemas.

use arrow::datatypes::{DataType, Field, Schema};

use gebruiksruimte_core::reference;

pub const COMPANIES: &str = "companies";
pub const PARCELS: &str = "parcels";
pub const FERTILIZERS: &str = "fertilizers";
pub const USAGE_NORMS: &str = "usage_norms";
pub const APPLICATIONS: &str = "applications";

pub fn company_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("place", DataType::Utf8, true),
        Field::new("user_id", DataType::Utf8, false),
    ])
}

pub fn parcel_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("soil_type", DataType::Utf8, false),
        Field::new("p_al", DataType::Float64, true),
        Field::new("p_cacl2", DataType::Float64, true),
        Field::new("area_ha", DataType::Float64, true),
        Field::new("calculated_area_ha", DataType::Float64, true),
        Field::new("nv_area", DataType::Boolean, false),
        Field::new("user_id", DataType::Utf8, false),
    ])
}

/// Parcel file layout. Soil values stay text until parsed, since
/// administrations write them with a decimal comma or as "n.v.t.".
pub fn parcel_source_schema() -> Schema {
    let fields = parcel_schema()
        .fields()
        .iter()
        .map(|f| match f.name().as_str() {
            "p_al" | "p_cacl2" => Field::new(f.name(), DataType::Utf8, true),
            _ => f.as_ref().clone(),
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

pub fn fertilizer_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("application_type", DataType::Utf8, false),
        Field::new("n_pct", DataType::Float64, true),
        Field::new("p2o5_pct", DataType::Float64, true),
        Field::new("k2o_pct", DataType::Float64, true),
    ])
}

pub fn usage_norm_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("company_id", DataType::Utf8, false),
        Field::new("parcel_id", DataType::Utf8, false),
        Field::new("crop_id", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("n_total_kg_ha", DataType::Float64, false),
        Field::new("n_animal_kg_ha", DataType::Float64, false),
        Field::new("p2o5_kg_ha", DataType::Float64, false),
        Field::new("derogation", DataType::Boolean, false),
        Field::new("user_id", DataType::Utf8, false),
    ])
}

/// Effective amounts are nullable: rows written before they were stored lack them.
pub fn application_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("usage_norm_id", DataType::Utf8, false),
        Field::new("company_id", DataType::Utf8, false),
        Field::new("parcel_id", DataType::Utf8, false),
        Field::new("fertilizer_id", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("quantity_kg_ha", DataType::Float64, false),
        Field::new("n_kg_ha", DataType::Float64, false),
        Field::new("p2o5_kg_ha", DataType::Float64, false),
        Field::new("k2o_kg_ha", DataType::Float64, false),
        Field::new("eff_n_kg_ha", DataType::Float64, true),
        Field::new("eff_n_animal_kg_ha", DataType::Float64, true),
        Field::new("eff_p2o5_kg_ha", DataType::Float64, true),
        Field::new("coefficient_pct", DataType::Float64, true),
        Field::new("context", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("own_farm", DataType::Boolean, false),
        Field::new("notes", DataType::Utf8, true),
        Field::new("user_id", DataType::Utf8, false),
    ])
}

const NONE: &[&str] = &[];
const KEYED: &[&str] = &["PRIMARY KEY (id)"];
const CROP_KEYS: &[&str] = &["PRIMARY KEY (id)", "UNIQUE (year, crop)"];
const USAGE_NORM_KEYS: &[&str] = &["PRIMARY KEY (id)", "UNIQUE (parcel_id, crop_id, year)"];

/// Tables created on open: entities plus the three norm tables.
///
/// Coefficient tables are left out: their presence decides which coefficient
/// backend is active, so they only exist once loaded.
pub(crate) fn managed() -> Vec<(&'static str, Schema, &'static [&'static str])> {
    vec![
        (reference::CROP_NORMS, reference::crop_norm_schema(), CROP_KEYS),
        (reference::PHOSPHATE_NORMS, reference::phosphate_norm_schema(), NONE),
        (reference::DEROGATION_NORMS, reference::derogation_norm_schema(), NONE),
        (COMPANIES, company_schema(), KEYED),
        (PARCELS, parcel_schema(), KEYED),
        (FERTILIZERS, fertilizer_schema(), KEYED),
        (USAGE_NORMS, usage_norm_schema(), USAGE_NORM_KEYS),
        (APPLICATIONS, application_schema(), KEYED),
    ]
}

/// Whether rows loaded into `table` are user-owned entities (merged by id)
/// rather than reference rows (replaced wholesale).
pub(crate) fn is_entity(table: &str) -> bool {
    [COMPANIES, PARCELS, FERTILIZERS].contains(&table)
}

/// Any table a data directory may supply, with its expected layout.
pub fn loadable() -> Vec<(&'static str, Schema)> {
    let mut tables = reference::all();
    tables.push((COMPANIES, company_schema()));
    tables.push((PARCELS, parcel_schema()));
    tables.push((FERTILIZERS, fertilizer_schema()));
    tables
}

pub(crate) fn sql_type(dt: &DataType) -> &'static str {
    match dt {
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 => "DATE",
        _ => "VARCHAR",
    }
}

pub(crate) fn create_table_sql(name: &str, schema: &Schema, constraints: &[&str]) -> String {
    let mut parts: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let null = if f.is_nullable() { "" } else { " NOT NULL" };
            format!("{} {}{null}", f.name(), sql_type(f.data_type()))
        })
        .collect();
    parts.extend(constraints.iter().map(|c| c.to_string()));
    format!("CREATE TABLE IF NOT EXISTS {name} ({})", parts.join(", "))
}

/// `CAST(col AS TYPE) AS col, ...` for every expected field, in schema order.
/// Fields the source lacks become typed NULLs.
pub(crate) fn cast_projection(expected: &Schema, actual: &Schema) -> String {
    expected
        .fields()
        .iter()
        .map(|f| {
            let ty = sql_type(f.data_type());
            if actual.field_with_name(f.name()).is_ok() {
                format!("CAST({0} AS {ty}) AS {0}", f.name())
            } else {
                format!("CAST(NULL AS {ty}) AS {}", f.name())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Required columns of `expected` that `actual` lacks.
pub(crate) fn missing_required(expected: &Schema, actual: &Schema) -> Vec<String> {
    reference::missing_columns(expected, actual)
        .into_iter()
        .filter(|name| {
            expected
                .field_with_name(name)
                .is_ok_and(|f| !f.is_nullable())
        })
        .collect()
}

/// Comma-separated column names, in schema order.
pub(crate) fn column_list(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
