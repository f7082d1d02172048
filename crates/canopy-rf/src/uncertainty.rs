//! Prediction spread of an ensemble's members.
//!
//! Two reporting conventions coexist: tile maps carry the raw spread, while
//! hold-out validation reports a 95 % half-width that treats the spread as
//! the standard error of the ensemble mean.

use crate::ensemble::Ensemble;
use crate::error::RfError;

/// z-score of a two-sided 95 % normal interval.
pub const Z_95: f64 = 1.96;

/// Aggregate prediction and member spread for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadPrediction {
    /// Mean over ensemble members.
    pub prediction: f64,
    /// Root-mean-square deviation of the members from `prediction`.
    pub spread: f64,
}

/// Root-mean-square deviation of `members` from `aggregate`.
///
/// Zero when every member equals the aggregate or when `members` is empty.
#[must_use]
pub fn prediction_spread(aggregate: f64, members: &[f64]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let mean_sq = members
        .iter()
        .map(|m| (aggregate - m).powi(2))
        .sum::<f64>()
        / members.len() as f64;
    mean_sq.sqrt()
}

/// Half-width of the 95 % interval: `1.96 · spread / √n_members`.
#[must_use]
pub fn confidence_half_width_95(spread: f64, n_members: usize) -> f64 {
    if n_members == 0 {
        return 0.0;
    }
    Z_95 * spread / (n_members as f64).sqrt()
}

/// Predict every row and attach the unscaled member spread.
///
/// # Errors
///
/// Propagates the ensemble's prediction errors.
pub fn predict_with_spread<E: Ensemble + ?Sized>(
    ensemble: &E,
    rows: &[Vec<f64>],
) -> Result<Vec<SpreadPrediction>, RfError> {
    let members = ensemble.predict_members_batch(rows)?;
    Ok(members
        .iter()
        .map(|m| {
            let prediction = if m.is_empty() {
                0.0
            } else {
                m.iter().sum::<f64>() / m.len() as f64
            };
            SpreadPrediction {
                prediction,
                spread: prediction_spread(prediction, m),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{confidence_half_width_95, predict_with_spread, prediction_spread};
    use crate::ensemble::Ensemble;
    use crate::error::RfError;

    struct Fixed(Vec<Vec<f64>>);

    impl Ensemble for Fixed {
        fn predict_batch(&self, _rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
            Ok(self
                .0
                .iter()
                .map(|m| m.iter().sum::<f64>() / m.len() as f64)
                .collect())
        }

        fn predict_members_batch(&self, _rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RfError> {
            Ok(self.0.clone())
        }

        fn n_members(&self) -> usize {
            self.0.first().map_or(0, Vec::len)
        }
    }

    #[test]
    fn spread_of_agreeing_members_is_zero() {
        assert_eq!(prediction_spread(40.0, &[40.0, 40.0, 40.0]), 0.0);
    }

    #[test]
    fn spread_is_population_rms() {
        // Members 10 and 30 around 20: deviations of 10 each.
        assert_relative_eq!(prediction_spread(20.0, &[10.0, 30.0]), 10.0);
        assert_relative_eq!(
            prediction_spread(2.0, &[1.0, 2.0, 3.0]),
            (2.0f64 / 3.0).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn half_width_scales_by_root_members() {
        assert_relative_eq!(confidence_half_width_95(10.0, 4), 9.8, epsilon = 1e-12);
        assert_eq!(confidence_half_width_95(3.0, 0), 0.0);
    }

    #[test]
    fn predict_with_spread_uses_member_mean() {
        let ens = Fixed(vec![vec![10.0, 30.0], vec![5.0, 5.0]]);
        let out = predict_with_spread(&ens, &[vec![0.0], vec![0.0]]).unwrap();
        assert_relative_eq!(out[0].prediction, 20.0);
        assert_relative_eq!(out[0].spread, 10.0);
        assert_eq!(out[1].spread, 0.0);
        assert!(out.iter().all(|p| p.spread >= 0.0));
    }
}
