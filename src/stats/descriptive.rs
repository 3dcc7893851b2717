//! Descriptive statistics.

use crate::models::AggregateResult;
use statrs::statistics::{Data, Median, Statistics};

/// Arithmetic mean of the values, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Median of the values, or `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Data::new(values.to_vec()).median())
    }
}

/// Drop missing entries.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Summary statistics of a sample.
///
/// Keys: `count`, `mean`, `std_dev` (sample, n-1), `sem`, `median`,
/// `min`, `max`. Statistics that are undefined for the sample size are
/// left out; `count` is always present.
pub fn describe(values: &[f64]) -> AggregateResult {
    let mut result = AggregateResult::new();
    result.insert("count".to_string(), values.len() as f64);

    if values.is_empty() {
        return result;
    }

    let n = values.len() as f64;
    result.insert("mean".to_string(), values.iter().mean());
    result.insert("min".to_string(), Statistics::min(values.iter()));
    result.insert("max".to_string(), Statistics::max(values.iter()));
    if let Some(m) = median(values) {
        result.insert("median".to_string(), m);
    }

    if values.len() > 1 {
        let sd = values.iter().std_dev();
        result.insert("std_dev".to_string(), sd);
        result.insert("sem".to_string(), sd / n.sqrt());
    }

    result
}
