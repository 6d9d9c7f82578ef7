//! Error taxonomy for the ingestion pipeline.
//!
//! Stage failures (`ResourceUnavailable`, `MalformedManifest`) abort a run.
//! `MalformedRow` only surfaces when the caller asked for
//! [`MalformedRowPolicy::Reject`](crate::series::MalformedRowPolicy::Reject);
//! otherwise row problems are recorded on the collection and parsing goes on.

use crate::location::Location;

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("resource unavailable: {location}: {reason}")]
    ResourceUnavailable { location: Location, reason: String },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("malformed row at line {line}, column {column}: {reason}")]
    MalformedRow {
        line: usize,
        column: usize,
        reason: String,
    },
}

impl PipelineError {
    pub(crate) fn unavailable(location: &Location, reason: impl ToString) -> Self {
        PipelineError::ResourceUnavailable {
            location: location.clone(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
