//! Out-of-bag accuracy.

use serde::Serialize;

use crate::error::RfError;
use crate::tree::RegressionTree;

/// Accuracy of each row's prediction by the trees that never drew it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OobScore {
    pub r2: f64,
    pub mse: f64,
    /// Rows left out by at least one tree.
    pub n_oob_samples: usize,
}

/// Coefficient of determination.
///
/// A constant target scores 1 when matched exactly and 0 otherwise.
pub(crate) fn r2_score(observed: &[f64], predicted: &[f64]) -> f64 {
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let (ss_res, ss_tot) = observed
        .iter()
        .zip(predicted)
        .fold((0.0, 0.0), |(res, tot), (y, p)| {
            (res + (y - p).powi(2), tot + (y - mean).powi(2))
        });
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Score every row that some tree left out of its bootstrap.
///
/// `left_out[t]` lists the rows tree `t` never drew.
pub(crate) fn compute_oob(
    trees: &[RegressionTree],
    features: &[Vec<f64>],
    targets: &[f64],
    left_out: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut totals = vec![(0.0, 0usize); features.len()];
    for (tree, rows) in trees.iter().zip(left_out) {
        for &row in rows {
            let slot = &mut totals[row];
            slot.0 += tree.predict(&features[row])?;
            slot.1 += 1;
        }
    }

    let (observed, predicted): (Vec<f64>, Vec<f64>) = totals
        .iter()
        .zip(targets)
        .filter(|((_, n), _)| *n > 0)
        .map(|(&(sum, n), &y)| (y, sum / n as f64))
        .unzip();
    if observed.is_empty() {
        return Err(RfError::OobEvaluationFailed {
            reason: "every row was drawn by every tree".to_string(),
        });
    }

    let n = observed.len();
    let mse = observed
        .iter()
        .zip(&predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum::<f64>()
        / n as f64;
    Ok(OobScore {
        r2: r2_score(&observed, &predicted),
        mse,
        n_oob_samples: n,
    })
}
