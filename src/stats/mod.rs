//! Statistical routines.
//!
//! Descriptive aggregates and the two-sample hypothesis tests used to
//! compare the baseline and application periods of a channel.

pub mod descriptive;
pub mod hypothesis;
pub mod shapiro;

pub use descriptive::*;
pub use hypothesis::*;
pub use shapiro::shapiro_wilk;

use thiserror::Error;

/// Reasons a statistic cannot be computed for a sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("need at least {needed} values, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("samples have zero variance")]
    ZeroVariance,

    #[error("distribution error: {0}")]
    Distribution(String),
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;

pub(crate) fn require_len(values: &[f64], needed: usize) -> StatsResult<()> {
    if values.len() < needed {
        return Err(StatsError::TooFewSamples {
            needed,
            got: values.len(),
        });
    }
    Ok(())
}
