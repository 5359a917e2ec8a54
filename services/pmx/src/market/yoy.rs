//! Year-over-year change between two aggregate maps

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::market::aggregate::{Aggregate, AggregateMap};
use crate::market::record::GroupKey;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YoyChange {
    pub current_mean: f64,
    pub prior_mean: f64,
    /// Full precision; rounding happens when results are shaped
    pub percent_change: f64,
}

pub type YoyMap = BTreeMap<GroupKey, YoyChange>;

pub fn percent_change(current: f64, prior: f64) -> f64 {
    (current - prior) / prior * 100.0
}

/// Compare `current` against `prior` for every key present in both.
///
/// Keys missing from `prior` are left out of the result. A non-positive
/// mean on either side is an upstream defect and fails the whole call.
pub fn compute_yoy(current: &AggregateMap, prior: &AggregateMap) -> Result<YoyMap, PipelineError> {
    let mut result = YoyMap::new();

    for (key, cur) in current {
        let Some(prev) = prior.get(key) else {
            continue;
        };
        check_mean(key, cur, "current")?;
        check_mean(key, prev, "prior")?;

        result.insert(
            key.clone(),
            YoyChange {
                current_mean: cur.mean,
                prior_mean: prev.mean,
                percent_change: percent_change(cur.mean, prev.mean),
            },
        );
    }

    tracing::debug!(
        "YoY matched {} of {} current groups against {} prior groups",
        result.len(),
        current.len(),
        prior.len()
    );

    Ok(result)
}

fn check_mean(key: &GroupKey, agg: &Aggregate, side: &str) -> Result<(), PipelineError> {
    if !(agg.mean.is_finite() && agg.mean > 0.0) {
        return Err(PipelineError::invariant(
            key,
            format!("{} mean must be positive, got {}", side, agg.mean),
        ));
    }
    if agg.count == 0 {
        return Err(PipelineError::invariant(
            key,
            format!("{} aggregate has no records", side),
        ));
    }
    Ok(())
}
