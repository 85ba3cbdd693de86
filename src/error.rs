//! Error taxonomy for the reconciliation engine.
//!
//! Every engine operation resolves to one of these kinds; store-specific
//! errors never leak past the service boundary.

use thiserror::Error;

use crate::models::Money;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The invoice or payment id does not resolve within the caller's scope.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The resource exists but belongs to a different owner.
    #[error("{0} belongs to a different owner")]
    Forbidden(&'static str),

    /// The operation is illegal in the resource's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The payment amount exceeds the invoice's remaining balance. Carries
    /// the exact remaining balance for client display.
    #[error("payment of {amount} exceeds remaining balance of {remaining}")]
    OverpaymentRejected { amount: Money, remaining: Money },

    /// Malformed input.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The transaction aborted on a concurrent conflicting write, even after
    /// retries. The caller should retry the whole operation; no partial
    /// effect was applied.
    #[error("transaction conflict; retry the operation")]
    ConflictRetryable,

    /// The store failed before anything was committed; safe to retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),
}

impl LedgerError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::InvalidState(_) => "invalid_state",
            LedgerError::OverpaymentRejected { .. } => "overpayment_rejected",
            LedgerError::ValidationError(_) => "validation_error",
            LedgerError::ConflictRetryable => "conflict_retryable",
            LedgerError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict(_) => LedgerError::ConflictRetryable,
            StoreError::Unavailable(source) => LedgerError::StorageUnavailable(source),
        }
    }
}
