//! Two-sample hypothesis tests.
//!
//! All p-values are two-sided.

use super::{require_len, StatsError, StatsResult};
use crate::models::TestOutcome;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use statrs::statistics::{Data, Median, Statistics};

/// Largest size of the smaller sample for which the exact Mann-Whitney
/// distribution is used.
const MWU_EXACT_LIMIT: usize = 8;

fn distribution_error(e: impl std::fmt::Display) -> StatsError {
    StatsError::Distribution(e.to_string())
}

fn two_sided_t(t: f64, df: f64) -> StatsResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(distribution_error)?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

/// Levene's test for equal variances, centered on the group medians
/// (Brown-Forsythe).
pub fn levene(groups: &[&[f64]]) -> StatsResult<TestOutcome> {
    let k = groups.len();
    if k < 2 {
        return Err(StatsError::TooFewSamples { needed: 2, got: k });
    }
    for g in groups {
        require_len(g, 1)?;
    }

    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let center = Data::new(g.to_vec()).median();
            g.iter().map(|v| (v - center).abs()).collect()
        })
        .collect();

    let total: usize = deviations.iter().map(Vec::len).sum();
    if total <= k {
        return Err(StatsError::TooFewSamples {
            needed: k + 1,
            got: total,
        });
    }

    let group_means: Vec<f64> = deviations.iter().map(|z| z.iter().mean()).collect();
    let grand_mean = deviations.iter().flatten().sum::<f64>() / total as f64;

    let between: f64 = deviations
        .iter()
        .zip(&group_means)
        .map(|(z, m)| z.len() as f64 * (m - grand_mean).powi(2))
        .sum();
    let within: f64 = deviations
        .iter()
        .zip(&group_means)
        .map(|(z, m)| z.iter().map(|v| (v - m).powi(2)).sum::<f64>())
        .sum();

    // every group constant: W is undefined, leave the decision to the other tests
    if within <= 0.0 {
        return Ok(TestOutcome {
            statistic: f64::NAN,
            p_value: f64::NAN,
        });
    }

    let df_between = (k - 1) as f64;
    let df_within = (total - k) as f64;
    let w = (df_within / df_between) * (between / within);

    let dist = FisherSnedecor::new(df_between, df_within).map_err(distribution_error)?;
    Ok(TestOutcome {
        statistic: w,
        p_value: dist.sf(w),
    })
}

/// Independent two-sample t-test assuming equal variances.
pub fn student_t(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    require_len(x, 2)?;
    require_len(y, 2)?;

    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * x.iter().variance() + (n2 - 1.0) * y.iter().variance()) / df;
    if pooled <= 0.0 {
        return Err(StatsError::ZeroVariance);
    }

    let t = (x.iter().mean() - y.iter().mean()) / (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    Ok(TestOutcome {
        statistic: t,
        p_value: two_sided_t(t, df)?,
    })
}

/// Welch's t-test (unequal variances).
pub fn welch_t(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    require_len(x, 2)?;
    require_len(y, 2)?;

    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let v1 = x.iter().variance() / n1;
    let v2 = y.iter().variance() / n2;
    let se2 = v1 + v2;
    if se2 <= 0.0 {
        return Err(StatsError::ZeroVariance);
    }

    let df = se2.powi(2) / (v1.powi(2) / (n1 - 1.0) + v2.powi(2) / (n2 - 1.0));
    let t = (x.iter().mean() - y.iter().mean()) / se2.sqrt();
    Ok(TestOutcome {
        statistic: t,
        p_value: two_sided_t(t, df)?,
    })
}

/// Average ranks (1-based) of the pooled samples and the sizes of tied groups.
fn rank_with_ties(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share the average of ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }

    (ranks, ties)
}

/// Number of arrangements of `m` + `n` observations giving each value of U.
fn mann_whitney_counts(m: usize, n: usize) -> Vec<f64> {
    // row[j] holds the frequencies for (i, j) while sweeping i upwards
    let mut row: Vec<Vec<f64>> = vec![vec![1.0]; n + 1];
    for i in 1..=m {
        let mut next: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        next.push(vec![1.0]);
        for j in 1..=n {
            let mut freq = vec![0.0; i * j + 1];
            for (u, count) in next[j - 1].iter().enumerate() {
                freq[u] += count;
            }
            for (u, count) in row[j].iter().enumerate() {
                freq[u + j] += count;
            }
            next.push(freq);
        }
        row = next;
    }
    row.pop().unwrap_or_else(|| vec![1.0])
}

/// Mann-Whitney U test.
///
/// The statistic is U for `x`. Uses the exact distribution when there
/// are no ties and the smaller sample has at most eight values,
/// otherwise the normal approximation with tie and continuity correction.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    require_len(x, 1)?;
    require_len(y, 1)?;

    let (n1, n2) = (x.len(), y.len());
    let pooled: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, ties) = rank_with_ties(&pooled);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);

    let p_value = if ties.is_empty() && n1.min(n2) <= MWU_EXACT_LIMIT {
        let counts = mann_whitney_counts(n1.min(n2), n1.max(n2));
        let total: f64 = counts.iter().sum();
        let at_least = u.round() as usize;
        let upper: f64 = counts.iter().skip(at_least).sum();
        2.0 * upper / total
    } else {
        let n = (n1 + n2) as f64;
        let tie_term: f64 = ties.iter().map(|&t| (t.pow(3) - t) as f64).sum();
        let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
        if variance <= 0.0 {
            return Err(StatsError::ZeroVariance);
        }
        let mu = (n1 * n2) as f64 / 2.0;
        let z = (u - mu - 0.5) / variance.sqrt();
        let normal = Normal::new(0.0, 1.0).map_err(distribution_error)?;
        2.0 * normal.sf(z)
    };

    Ok(TestOutcome {
        statistic: u1,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    const Y: [f64; 5] = [6.0, 7.0, 8.0, 9.0, 10.0];

    #[test]
    fn test_student_t() {
        let result = student_t(&X, &Y).unwrap();
        assert!((result.statistic + 5.0).abs() < 1e-12);
        // t = 5 with 8 degrees of freedom
        assert!(result.p_value > 0.00100 && result.p_value < 0.00110);
    }

    #[test]
    fn test_welch_matches_student_for_equal_variances() {
        let student = student_t(&X, &Y).unwrap();
        let welch = welch_t(&X, &Y).unwrap();
        assert!((student.statistic - welch.statistic).abs() < 1e-12);
        assert!((student.p_value - welch.p_value).abs() < 1e-9);
    }

    #[test]
    fn test_welch_unequal_variances() {
        let wide = [1.0, 10.0, 20.0, 30.0, 40.0];
        let welch = welch_t(&X, &wide).unwrap();
        let student = student_t(&X, &wide).unwrap();
        assert!((welch.statistic - student.statistic).abs() < 1e-12);
        // fewer effective degrees of freedom widen the p-value
        assert!(welch.p_value > student.p_value);
    }

    #[test]
    fn test_t_tests_reject_constant_samples() {
        assert_eq!(
            student_t(&[1.0, 1.0], &[1.0, 1.0]).unwrap_err(),
            StatsError::ZeroVariance
        );
        assert_eq!(
            welch_t(&[2.0, 2.0, 2.0], &[5.0, 5.0]).unwrap_err(),
            StatsError::ZeroVariance
        );
        assert!(matches!(
            student_t(&[1.0], &Y),
            Err(StatsError::TooFewSamples { .. })
        ));
    }

    #[test]
    fn test_levene_median_centered() {
        let spread = [2.0, 4.0, 6.0, 8.0, 10.0];
        let result = levene(&[&X, &spread]).unwrap();
        assert!((result.statistic - 36.0 / 17.5).abs() < 1e-12);
        assert!(result.p_value > 0.15 && result.p_value < 0.25);
    }

    #[test]
    fn test_levene_identical_spread() {
        let result = levene(&[&X, &Y]).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_levene_constant_groups_is_undefined() {
        let result = levene(&[&[3.0, 3.0, 3.0], &[7.0, 7.0]]).unwrap();
        assert!(result.statistic.is_nan());
        assert!(result.p_value.is_nan());
    }

    #[test]
    fn test_welch_with_constant_baseline() {
        let result = welch_t(&[0.0; 7], &[3.0, 5.0, 2.0, 4.0, 6.0]).unwrap();
        assert!(result.statistic < 0.0);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn test_rank_with_ties() {
        let (ranks, ties) = rank_with_ties(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(ties, vec![2]);
    }

    #[test]
    fn test_mann_whitney_counts() {
        // m = 2, n = 2: U takes 0..=4 with frequencies 1,1,2,1,1
        assert_eq!(mann_whitney_counts(2, 2), vec![1.0, 1.0, 2.0, 1.0, 1.0]);
        let total: f64 = mann_whitney_counts(5, 5).iter().sum();
        assert_eq!(total, 252.0);
    }

    #[test]
    fn test_mann_whitney_exact() {
        let result = mann_whitney_u(&X, &Y).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!((result.p_value - 2.0 / 252.0).abs() < 1e-12);

        let reversed = mann_whitney_u(&Y, &X).unwrap();
        assert_eq!(reversed.statistic, 25.0);
        assert!((reversed.p_value - result.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_overlapping_samples_not_significant() {
        let result = mann_whitney_u(&[1.0, 3.0, 5.0, 7.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!(result.p_value > 0.5);
    }

    #[test]
    fn test_mann_whitney_asymptotic_with_ties() {
        let x = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let y: Vec<f64> = (10..20).map(f64::from).collect();
        let result = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!(result.p_value > 1e-4 && result.p_value < 1e-3);
    }
}
