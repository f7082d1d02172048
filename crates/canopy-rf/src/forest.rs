//! Bagged training of the regression forest.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::importance::FeatureImportances;
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingSummary};
use crate::tree::RegressionTree;

/// A fitted forest of regression trees that predicts canopy cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<RegressionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Shape and finiteness checks; returns the column count.
pub(crate) fn validate_dataset(features: &[Vec<f64>], targets: &[f64]) -> Result<usize, RfError> {
    let Some(first) = features.first() else {
        return Err(RfError::EmptyDataset);
    };
    if targets.len() != features.len() {
        return Err(RfError::TargetCountMismatch {
            rows: features.len(),
            targets: targets.len(),
        });
    }
    let width = first.len();
    if width == 0 {
        return Err(RfError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != width {
            return Err(RfError::FeatureCountMismatch {
                expected: width,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    match targets.iter().position(|y| !y.is_finite()) {
        Some(sample_index) => Err(RfError::NonFiniteTarget { sample_index }),
        None => Ok(width),
    }
}

/// Rows drawn with replacement, and the rows never drawn.
fn draw_bootstrap(n_rows: usize, n_draws: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let drawn: Vec<usize> = (0..n_draws).map(|_| rng.gen_range(0..n_rows)).collect();
    let mut seen = vec![false; n_rows];
    for &row in &drawn {
        seen[row] = true;
    }
    let out_of_bag = (0..n_rows).filter(|&row| !seen[row]).collect();
    (drawn, out_of_bag)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    targets: &[f64],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_dataset(features, targets)?;
    if feature_names.len() != n_features {
        return Err(RfError::LengthMismatch {
            what: "feature_names",
            expected: n_features,
            got: feature_names.len(),
        });
    }
    let limits = config.growth_limits(n_features)?;
    let n_rows = features.len();
    let n_draws = (n_rows as f64 * config.bootstrap_fraction).ceil() as usize;

    // Column-major copy, shared by every tree.
    let columns: Vec<Vec<f64>> = (0..n_features)
        .map(|c| features.iter().map(|row| row[c]).collect())
        .collect();

    let mut master = ChaCha8Rng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.r#gen()).collect();
    debug!(
        max_features = limits.max_features,
        n_draws, "growing trees"
    );

    let (trees, out_of_bag): (Vec<RegressionTree>, Vec<Vec<usize>>) = seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (drawn, oob) = draw_bootstrap(n_rows, n_draws, &mut rng);
            let tree = RegressionTree::grow(&columns, targets, &drawn, &limits, rng.r#gen());
            (tree, oob)
        })
        .unzip();

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, features, targets, &out_of_bag)?),
        OobMode::Disabled => None,
    };
    let importances = FeatureImportances::from_trees(&trees, feature_names);
    let summary = TrainingSummary::new(&trees, n_rows, limits.max_features);
    info!(
        n_trees = summary.n_trees,
        mean_depth = summary.mean_depth,
        oob_r2 = oob_score.map(|s| s.r2),
        "forest trained"
    );

    let forest = RandomForest {
        trees,
        n_features,
        feature_names: feature_names.to_vec(),
    };
    Ok(RandomForestResult::new(forest, importances, oob_score, summary))
}
