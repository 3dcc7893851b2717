//! Shapiro-Wilk normality test.
//!
//! Royston's approximation (Applied Statistics algorithm AS R94) for
//! 3 <= n <= 5000: polynomial approximations of the coefficients and a
//! normalizing transformation of W for the p-value.

use super::{require_len, StatsError, StatsResult};
use crate::models::TestOutcome;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::warn;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

const MAX_SAMPLES: usize = 5000;

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`.
fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal() -> StatsResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))
}

/// Coefficients `a[0..n/2]` for the ordered sample, largest weight first.
fn coefficients(n: usize) -> StatsResult<Vec<f64>> {
    let half = n / 2;
    if n == 3 {
        return Ok(vec![std::f64::consts::FRAC_1_SQRT_2]);
    }

    let normal = standard_normal()?;
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|x| x * x).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let mut a = vec![0.0; half];
    a[0] = poly(&C1, rsn) - m[0] / ssumm2;

    let (first, fac) = if n > 5 {
        a[1] = poly(&C2, rsn) - m[1] / ssumm2;
        let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a[0].powi(2) - 2.0 * a[1].powi(2)))
        .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a[0].powi(2))).sqrt();
        (1, fac)
    };

    for i in first..half {
        a[i] = -m[i] / fac;
    }

    Ok(a)
}

/// Shapiro-Wilk test for normality.
///
/// Returns W as the statistic. Small p-values reject normality.
pub fn shapiro_wilk(values: &[f64]) -> StatsResult<TestOutcome> {
    require_len(values, 3)?;
    if values.len() > MAX_SAMPLES {
        return Err(StatsError::Distribution(format!(
            "Shapiro-Wilk supports at most {} values",
            MAX_SAMPLES
        )));
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    let n = x.len();

    // a constant sample has no shape to test; report it as not rejecting normality
    let range = x[n - 1] - x[0];
    if range < 1e-19 {
        warn!("Shapiro-Wilk on {} identical values, assuming W = 1", n);
        return Ok(TestOutcome {
            statistic: 1.0,
            p_value: 1.0,
        });
    }

    let a = coefficients(n)?;
    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (numerator * numerator / ssq).min(1.0);

    Ok(TestOutcome {
        statistic: w,
        p_value: p_value(w, n)?,
    })
}

fn p_value(w: f64, n: usize) -> StatsResult<f64> {
    if n == 3 {
        const PI6: f64 = 6.0 / std::f64::consts::PI;
        const STQR: f64 = std::f64::consts::FRAC_PI_3;
        return Ok((PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0));
    }

    let an = n as f64;
    let w1 = (1.0 - w).ln();

    let (y, m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if w1 >= gamma {
            return Ok(1e-99);
        }
        (-(gamma - w1).ln(), poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (w1, poly(&C5, xx), poly(&C6, xx).exp())
    };

    Ok(standard_normal()?.sf((y - m) / s))
}
