use thiserror::Error;

use crate::market::record::GroupKey;

/// Defects inside the aggregation core.
///
/// "No data" is never an error: empty inputs flow through as empty maps.
/// This type is reserved for states the upstream invariants rule out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invariant violated for {key}: {detail}")]
    InvariantViolation { key: GroupKey, detail: String },
}

impl PipelineError {
    pub fn invariant(key: &GroupKey, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            key: key.clone(),
            detail: detail.into(),
        }
    }
}
