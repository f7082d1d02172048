//! What a training run hands back.

use serde::Serialize;

use crate::forest::RandomForest;
use crate::importance::FeatureImportances;
use crate::oob::OobScore;
use crate::tree::RegressionTree;

/// Size and shape of a fitted forest.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_trees: usize,
    /// Columns tried at each split.
    pub max_features: usize,
    pub mean_depth: f64,
    pub mean_leaves: f64,
}

impl TrainingSummary {
    pub(crate) fn new(trees: &[RegressionTree], n_samples: usize, max_features: usize) -> Self {
        let n = trees.len().max(1) as f64;
        Self {
            n_samples,
            n_features: trees.first().map_or(0, |t| t.n_features),
            n_trees: trees.len(),
            max_features,
            mean_depth: trees.iter().map(|t| t.depth() as f64).sum::<f64>() / n,
            mean_leaves: trees.iter().map(|t| t.n_leaves() as f64).sum::<f64>() / n,
        }
    }
}

/// A fitted forest together with its importances and optional OOB score.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: FeatureImportances,
    oob_score: Option<OobScore>,
    summary: TrainingSummary,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: FeatureImportances,
        oob_score: Option<OobScore>,
        summary: TrainingSummary,
    ) -> Self {
        Self {
            forest,
            importances,
            oob_score,
            summary,
        }
    }

    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    #[must_use]
    pub fn importances(&self) -> &FeatureImportances {
        &self.importances
    }

    /// Present only when the forest was fitted with [`crate::OobMode::Enabled`].
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    #[must_use]
    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }
}
