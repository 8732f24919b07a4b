use std::io;

use thiserror::Error;

use crate::types::DocId;

/// Error type for cohort configuration, matching, and metadata failures.
#[derive(Debug, Error)]
pub enum CohortError {
    /// Matching ran out of negatives.
    #[error("negative pool exhausted before positive '{positive}' could be matched ({matched} pairs formed)")]
    InsufficientNegatives {
        /// First positive left without a negative.
        positive: DocId,
        /// Pairs formed before the pool ran dry.
        matched: usize,
    },
    /// An id the engine needs is absent from the record table.
    #[error("document '{0}' is not present in the record table")]
    UnknownDocument(DocId),
    /// Invalid criteria, conditions, or CLI values.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A metadata row could not be used.
    #[error("metadata row {line} is invalid: {reason}")]
    Metadata {
        /// One-based line number.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },
    /// Reading or writing a file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON encoding or decoding failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
