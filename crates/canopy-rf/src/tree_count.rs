//! Search over candidate ensemble sizes using repeated OOB scoring.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;

/// Configuration for a tree-count search.
///
/// Candidates are `min, min + step, ...` up to and including `max` when
/// it lies on the grid. Each run draws one subsample (without
/// replacement) that every candidate in that run is trained on.
///
/// # Defaults
///
/// | Parameter     | Default          |
/// |---------------|------------------|
/// | `runs`        | 3                |
/// | `sample_size` | `None` (all rows)|
/// | `seed`        | 42               |
#[derive(Debug, Clone)]
pub struct TreeCountSearch {
    min: usize,
    max: usize,
    step: usize,
    runs: usize,
    sample_size: Option<usize>,
    seed: u64,
}

/// Summary statistics for one candidate tree count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeCountSummary {
    /// Number of trees.
    pub n_trees: usize,
    /// Mean OOB R² over runs.
    pub r2_mean: f64,
    /// Population standard deviation of OOB R² over runs.
    pub r2_std: f64,
    /// Mean OOB MSE over runs.
    pub mse_mean: f64,
    /// Population standard deviation of OOB MSE over runs.
    pub mse_std: f64,
}

/// Scores of every (candidate, run) pair.
#[derive(Debug, Clone)]
pub struct TreeCountResult {
    candidates: Vec<usize>,
    /// `r2[candidate][run]`.
    r2: Vec<Vec<f64>>,
    /// `mse[candidate][run]`.
    mse: Vec<Vec<f64>>,
    sample_size: usize,
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl TreeCountSearch {
    /// Create a search over `min..=max` stepped by `step`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeRange`] when `min == 0`, `step == 0`,
    /// or `min > max`.
    pub fn new(min: usize, max: usize, step: usize) -> Result<Self, RfError> {
        if min == 0 || step == 0 || min > max {
            return Err(RfError::InvalidTreeRange { min, max, step });
        }
        Ok(Self {
            min,
            max,
            step,
            runs: 3,
            sample_size: None,
            seed: 42,
        })
    }

    /// Set the number of repetitions.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidRunCount`] if `runs` is zero.
    pub fn with_runs(mut self, runs: usize) -> Result<Self, RfError> {
        if runs == 0 {
            return Err(RfError::InvalidRunCount { runs });
        }
        self.runs = runs;
        Ok(self)
    }

    /// Set the subsample size drawn in each run.
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the candidate tree counts in ascending order.
    #[must_use]
    pub fn candidates(&self) -> Vec<usize> {
        (self.min..=self.max).step_by(self.step).collect()
    }

    /// Return the number of runs.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Train one OOB-scored forest per (candidate, run).
    ///
    /// `base` supplies every hyperparameter except the tree count, the
    /// seed and the OOB mode.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `features` is empty |
    /// | [`RfError::TargetCountMismatch`] | `targets.len() != features.len()` |
    /// | [`RfError::OobEvaluationFailed`] | a subsample left nothing out of bag |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(min = self.min, max = self.max, step = self.step, runs = self.runs))]
    pub fn run(
        &self,
        base: &RandomForestConfig,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<TreeCountResult, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if targets.len() != features.len() {
            return Err(RfError::TargetCountMismatch {
                rows: features.len(),
                targets: targets.len(),
            });
        }

        let n_rows = features.len();
        let sample_size = match self.sample_size {
            Some(s) if s > n_rows => {
                warn!(requested = s, available = n_rows, "sample size exceeds dataset, using all rows");
                n_rows
            }
            Some(0) | None => n_rows,
            Some(s) => s,
        };

        let candidates = self.candidates();
        info!(n_candidates = candidates.len(), sample_size, "searching tree counts");

        let mut r2 = vec![Vec::with_capacity(self.runs); candidates.len()];
        let mut mse = vec![Vec::with_capacity(self.runs); candidates.len()];
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);

        for run in 0..self.runs {
            let indices = rand::seq::index::sample(&mut master_rng, n_rows, sample_size).into_vec();
            let sub_features: Vec<Vec<f64>> = indices.iter().map(|&i| features[i].clone()).collect();
            let sub_targets: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();

            for (c, &n_trees) in candidates.iter().enumerate() {
                let config = base
                    .with_n_trees(n_trees)?
                    .with_oob_mode(OobMode::Enabled)
                    .with_seed(master_rng.r#gen());
                let result = config.fit(&sub_features, &sub_targets, feature_names)?;
                let oob = result.oob_score().ok_or_else(|| RfError::OobEvaluationFailed {
                    reason: "forest returned no OOB score".to_string(),
                })?;
                debug!(run, n_trees, oob_r2 = oob.r2, oob_mse = oob.mse, "candidate scored");
                r2[c].push(oob.r2);
                mse[c].push(oob.mse);
            }
        }

        Ok(TreeCountResult {
            candidates,
            r2,
            mse,
            sample_size,
        })
    }
}

impl TreeCountResult {
    /// Return the candidate tree counts.
    #[must_use]
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Return OOB R² per candidate per run.
    #[must_use]
    pub fn r2_runs(&self) -> &[Vec<f64>] {
        &self.r2
    }

    /// Return OOB MSE per candidate per run.
    #[must_use]
    pub fn mse_runs(&self) -> &[Vec<f64>] {
        &self.mse
    }

    /// Return the subsample size actually used.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Mean and population standard deviation per candidate.
    #[must_use]
    pub fn summary(&self) -> Vec<TreeCountSummary> {
        self.candidates
            .iter()
            .zip(self.r2.iter().zip(&self.mse))
            .map(|(&n_trees, (r2, mse))| {
                let (r2_mean, r2_std) = mean_std(r2);
                let (mse_mean, mse_std) = mean_std(mse);
                TreeCountSummary {
                    n_trees,
                    r2_mean,
                    r2_std,
                    mse_mean,
                    mse_std,
                }
            })
            .collect()
    }

    /// Smallest tree count whose mean R² is within `tolerance` of the best mean R².
    #[must_use]
    pub fn smallest_within(&self, tolerance: f64) -> Option<usize> {
        let summary = self.summary();
        let best = summary
            .iter()
            .map(|s| s.r2_mean)
            .max_by(f64::total_cmp)?;
        summary
            .iter()
            .find(|s| s.r2_mean >= best - tolerance)
            .map(|s| s.n_trees)
    }
}
