//! Seams between the bagging regressor and the code that consumes it.
//!
//! Uncertainty estimation, spatial hold-out validation, and the tile
//! predictor only need the operations below, so any regression ensemble
//! that can report its members' individual predictions can stand in for
//! [`RandomForest`].

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::forest::RandomForest;
use crate::importance::FeatureImportances;
use crate::oob::OobScore;

/// A fitted regression ensemble whose members can be queried individually.
pub trait Ensemble {
    /// Aggregate prediction (mean over members) for each row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError>;

    /// Per-member predictions for each row, `result[row][member]`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    fn predict_members_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RfError>;

    /// Number of members.
    fn n_members(&self) -> usize;
}

impl Ensemble for RandomForest {
    fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        RandomForest::predict_batch(self, rows)
    }

    fn predict_members_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RfError> {
        RandomForest::predict_members_batch(self, rows)
    }

    fn n_members(&self) -> usize {
        self.n_trees()
    }
}

/// Everything a trainer hands back besides the model itself.
#[derive(Debug, Clone)]
pub struct FitOutcome<E> {
    /// The fitted ensemble.
    pub ensemble: E,
    /// Column importances.
    pub importances: FeatureImportances,
    /// Out-of-bag score, when the trainer computed one.
    pub oob_score: Option<OobScore>,
}

/// Something that fits an [`Ensemble`] from tabular data.
pub trait EnsembleTrainer {
    /// The ensemble type produced.
    type Model: Ensemble;

    /// Fit on row-major `features` and `targets`.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the forest returns the errors of
    /// [`RandomForestConfig::fit`].
    fn fit_ensemble(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<FitOutcome<Self::Model>, RfError>;

    /// Fit with out-of-bag scoring switched on.
    ///
    /// # Errors
    ///
    /// As [`EnsembleTrainer::fit_ensemble`].
    fn fit_with_oob(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<FitOutcome<Self::Model>, RfError>;
}

impl EnsembleTrainer for RandomForestConfig {
    type Model = RandomForest;

    fn fit_ensemble(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<FitOutcome<RandomForest>, RfError> {
        let result = self.fit(features, targets, feature_names)?;
        let importances = result.importances().clone();
        let oob_score = result.oob_score().copied();
        Ok(FitOutcome {
            ensemble: result.into_forest(),
            importances,
            oob_score,
        })
    }

    fn fit_with_oob(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<FitOutcome<RandomForest>, RfError> {
        self.clone()
            .with_oob_mode(OobMode::Enabled)
            .fit_ensemble(features, targets, feature_names)
    }
}
