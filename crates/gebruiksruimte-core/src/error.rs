use thiserror::Error;

/// Errors raised by the calculation core.
///
/// Missing reference rows are not errors: resolvers return `None` (or a
/// documented default) and leave the decision to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Norm(#[from] NormError),

    #[error("reference backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Reasons a usage norm cannot be created for a (parcel, crop, year).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormError {
    #[error("no nitrogen norm for crop '{crop}' in {year}")]
    NitrogenNormMissing { crop: String, year: i32 },

    #[error("no phosphate norm for crop '{crop}' in {year}")]
    PhosphateNormMissing { crop: String, year: i32 },
}
