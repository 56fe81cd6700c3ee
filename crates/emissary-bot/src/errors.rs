//! Mapping from store failures to the user-reportable taxonomy.

use emissary_shared::EmissaryError;
use emissary_store::StoreError;

/// Translate a [`StoreError`] into an [`EmissaryError`], naming the record
/// the caller was after.
///
/// `NotFound` and `Duplicate` are expected business outcomes and carry a
/// user-facing message; everything else is logged here and surfaces as a
/// generic internal error.
pub fn store_error(err: StoreError, what: &str) -> EmissaryError {
    match err {
        StoreError::NotFound => {
            EmissaryError::NotFound(format!("Couldn't find {what}."))
        }
        StoreError::Duplicate(detail) => {
            EmissaryError::DuplicateEntity(format!("Couldn't save {what}: {detail}."))
        }
        other => {
            tracing::error!(error = %other, what, "store operation failed");
            EmissaryError::Internal(other.to_string())
        }
    }
}
