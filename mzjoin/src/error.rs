use serde::Serialize;

use crate::data::feature::RunId;

/// Errors that stop an alignment before any merge pass starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignmentError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl AlignmentError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Reasons a single feature record is excluded from alignment.
///
/// These never abort a run, they are collected in the alignment report.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum RecordError {
    #[error("m/z is not finite ({0})")]
    NonFiniteMz(f64),

    #[error("retention time is not finite ({0})")]
    NonFiniteRt(f64),

    #[error("m/z must not be negative ({0})")]
    NegativeMz(f64),

    #[error("row already holds a feature from run {0}")]
    DuplicateRun(RunId),
}
