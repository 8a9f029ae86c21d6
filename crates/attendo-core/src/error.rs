//! Core error type

use attendo_api::{ErrorCode, ErrorInfo, FieldError, ReasonCode, RecordStatus};
use attendo_store::StoreError;
use attendo_util::RecordId;
use thiserror::Error;

use crate::Transition;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Not allowed right now; surfaced to the caller as-is, never retried
    #[error("rejected: {}", join_reasons(.reasons))]
    PolicyRejected { reasons: Vec<ReasonCode> },

    #[error("cannot {transition} record {record_id} while it is {from}")]
    InvalidTransition {
        record_id: RecordId,
        from: RecordStatus,
        transition: Transition,
    },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Unknown id, or an id the caller does not own
    #[error("{0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Rendered-time recomputation failed; the transition did not commit
    #[error("accounting failed: {0}")]
    AggregationFailure(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<FieldError> for CoreError {
    fn from(e: FieldError) -> Self {
        CoreError::ValidationFailed(e.to_string())
    }
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::PolicyRejected { .. } => ErrorCode::PolicyRejected,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            CoreError::NotFound(_) => ErrorCode::NotFound,
            CoreError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            CoreError::AggregationFailure(_) => ErrorCode::AggregationFailure,
            CoreError::Store(_) => ErrorCode::InternalError,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.to_string())
    }
}

fn join_reasons(reasons: &[ReasonCode]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
