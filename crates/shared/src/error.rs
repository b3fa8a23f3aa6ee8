use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DraftField;

/// Failure taxonomy for directory operations. The repository produces these,
/// the store never does, and the sync controller is the only place that
/// branches on them.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// Client-side field validation failed; the repository was never called.
    #[error("invalid fields: {}", join_fields(.fields))]
    Validation { fields: Vec<DraftField> },
    /// The server rejected the payload (400/422).
    #[error("server rejected contact: {message}")]
    Rejected { message: String },
    #[error("contact not found")]
    NotFound,
    /// Transport-level failure before any response arrived.
    #[error("network failure: {message}")]
    Network { message: String },
    /// Non-2xx response outside the mapped cases, or an undecodable body.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },
}

impl DirectoryError {
    /// Whether re-triggering the same action can reasonably succeed.
    /// Validation and not-found failures need user action first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DirectoryError::Network { .. } | DirectoryError::Server { .. }
        )
    }

    pub fn invalid_fields(&self) -> &[DraftField] {
        match self {
            DirectoryError::Validation { fields } => fields,
            _ => &[],
        }
    }
}

fn join_fields(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error payload shape returned by the remote contact resource. Parsed
/// best-effort; a missing or malformed body falls back to the status text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
