use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::resonance::ResonanceId;

/// Errors raised by the peak model.
///
/// Validation failures are returned at the API boundary, nothing is retried.
/// Deleted peaks (status < 0) are never reported as errors, they are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum PeakError {
    /// Number of peak dimensions does not match the peak list or dataset.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A search was requested on a list without search dimensions.
    #[error("peak list {0} has no search dimensions")]
    NoSearchDims(String),
    /// Lists taking part in one clustering run differ in search dimension count.
    #[error("search dimension mismatch: expected {expected}, got {actual}")]
    SearchDimMismatch { expected: usize, actual: usize },
    #[error("malformed peak specifier: {0}")]
    MalformedSpecifier(String),
    /// Two resonances are bound to different atoms and cannot be merged.
    #[error("conflicting atom assignments: {a} vs {b}")]
    AtomConflict { a: String, b: String },
    #[error("peak list not found: {0}")]
    ListNotFound(String),
    #[error("peak list already exists: {0}")]
    DuplicateList(String),
    #[error("peak {peak} not found in list {list}")]
    PeakNotFound { list: String, peak: i32 },
    #[error("resonance {0} not found")]
    ResonanceNotFound(ResonanceId),
    /// The peak is already held by another path.
    #[error("peak {peak} in list {list} is already claimed")]
    PeakClaimed { list: String, peak: i32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, PeakError>;
