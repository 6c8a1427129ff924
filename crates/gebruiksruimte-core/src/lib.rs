pub mod aggregate;
pub mod coefficient;
pub mod context;
pub mod effective;
pub mod error;
pub mod import;
pub mod model;
pub mod norms;
pub mod parse;
pub mod schema;

pub use aggregate::{AggregationInput, AggregationReport, CompanyTotals, RedistributionMode, aggregate};
pub use coefficient::{
    CoefficientBackend, CoefficientInput, CoefficientOutcome, CoefficientRow, CoefficientSchema,
    CoefficientTable, resolve_coefficient,
};
pub use context::CallContext;
pub use error::{CoreError, NormError};
pub use import::{ImportOutcome, ImportPlan, ImportRow, SkipReason, SkippedRow, plan_import};
pub use model::{Application, Company, CropNormRow, Fertilizer, Parcel, UsageNorm};
pub use norms::{ReferenceTables, ResolvedNorm, best_year, resolve_usage_norm};
pub use schema::reference;
