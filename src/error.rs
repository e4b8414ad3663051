//! Error taxonomy for pipeline stages
//!
//! Every fallible operation returns an [`eyre::Result`]. When a failure falls
//! into one of the categories below it is raised as a [`PipelineError`] so
//! callers can recover the category with `report.downcast_ref::<PipelineError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing input file or sink table
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every attempt of a single page fetch failed
    #[error("Request to {url} failed after {attempts} attempt(s): {source}")]
    RequestExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered but the body is not JSON
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// No source produced a usable record
    #[error("No usable records: {0}")]
    EmptyResult(String),

    #[error("Unknown load strategy '{0}' (expected append, replace or upsert)")]
    UnknownStrategy(String),

    /// Per-column conversion failure, logged and absorbed by the transform stage
    #[error("Failed to convert column '{column}' to {target}: {reason}")]
    Conversion {
        column: String,
        target: String,
        reason: String,
    },

    #[error("Missing column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} value(s), expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_through_eyre() {
        let report: eyre::Report = PipelineError::UnknownStrategy("merge".to_string()).into();
        match report.downcast_ref::<PipelineError>() {
            Some(PipelineError::UnknownStrategy(name)) => assert_eq!(name, "merge"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns_message() {
        let err = PipelineError::MissingColumns(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Missing column(s): a, b");
    }
}
