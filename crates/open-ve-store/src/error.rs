use thiserror::Error;

/// §4.2 contract errors. Converted to `open_ve_core::AppError` at the
/// call site: `Unavailable` becomes `StoreUnavailable`, `KeyMissing`
/// becomes `UnitNotFound` when the caller is asking about a validation
/// unit, and is treated as "not found" generically otherwise.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("key missing: {0}")]
    KeyMissing(String),
}
