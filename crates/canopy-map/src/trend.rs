//! Mann-Kendall trend test with Sen's slope.

use std::cmp::Ordering;

use crate::error::MapError;
use crate::special::normal_cdf;

/// Direction of a monotonic trend at a given significance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    /// Significant upward trend.
    Increasing,
    /// Significant downward trend.
    Decreasing,
    /// No significant trend.
    None,
}

/// Result of [`mann_kendall`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannKendall {
    /// Kendall S statistic.
    pub s: f64,
    /// Variance of S, corrected for ties.
    pub var_s: f64,
    /// Continuity-corrected normal score.
    pub z: f64,
    /// Two-sided p-value.
    pub p: f64,
    /// Sen's slope: median of pairwise slopes.
    pub slope: f64,
}

impl MannKendall {
    /// Trend direction at significance level `alpha`.
    #[must_use]
    pub fn trend(&self, alpha: f64) -> Trend {
        if self.p >= alpha {
            Trend::None
        } else if self.z > 0.0 {
            Trend::Increasing
        } else if self.z < 0.0 {
            Trend::Decreasing
        } else {
            Trend::None
        }
    }
}

/// Run the Mann-Kendall test on an ordered series.
///
/// # Errors
///
/// Returns [`MapError::EmptySeries`] for fewer than two observations.
pub fn mann_kendall(series: &[f64]) -> Result<MannKendall, MapError> {
    let n = series.len();
    if n < 2 {
        return Err(MapError::EmptySeries { len: n });
    }

    let mut s = 0.0;
    let mut slopes = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n - 1 {
        for j in i + 1..n {
            let d = series[j] - series[i];
            s += match d.partial_cmp(&0.0) {
                Some(Ordering::Greater) => 1.0,
                Some(Ordering::Less) => -1.0,
                _ => 0.0,
            };
            slopes.push(d / (j - i) as f64);
        }
    }

    let nf = n as f64;
    let mut var_s = nf * (nf - 1.0) * (2.0 * nf + 5.0);
    for t in tie_group_sizes(series) {
        let t = t as f64;
        var_s -= t * (t - 1.0) * (2.0 * t + 5.0);
    }
    var_s /= 18.0;

    let z = if s > 0.0 {
        (s - 1.0) / var_s.sqrt()
    } else if s < 0.0 {
        (s + 1.0) / var_s.sqrt()
    } else {
        0.0
    };
    let p = 2.0 * (1.0 - normal_cdf(z.abs()));

    Ok(MannKendall {
        s,
        var_s,
        z,
        p,
        slope: median(&mut slopes),
    })
}

/// Sizes of groups of equal values, only groups larger than one.
fn tie_group_sizes(series: &[f64]) -> Vec<usize> {
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut groups = Vec::new();
    let mut run = 1;
    for w in sorted.windows(2) {
        if w[0] == w[1] {
            run += 1;
        } else {
            if run > 1 {
                groups.push(run);
            }
            run = 1;
        }
    }
    if run > 1 {
        groups.push(run);
    }
    groups
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
