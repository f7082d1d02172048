//! Forest hyper-parameters.

use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::SplitMethod;

/// How many predictor columns each split may look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n))`.
    Sqrt,
    /// `ceil(log2(n))`, at least 1.
    Log2,
    /// `ceil(n * f)` for `f` in (0, 1].
    Fraction(f64),
    /// Exactly this many.
    Fixed(usize),
    /// Every column. Regression forests default to this.
    All,
}

impl MaxFeatures {
    /// Column count for a table of `n_features` columns.
    pub(crate) fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        };
        if (1..=n_features).contains(&resolved) {
            Ok(resolved)
        } else {
            Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            })
        }
    }
}

/// Whether training also scores each row with the trees that never drew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    Enabled,
    Disabled,
}

/// Validated per-tree stopping rules, shared by every member of one forest.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLimits {
    pub(crate) split_method: SplitMethod,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: usize,
}

/// Hyper-parameters of a bagged regression forest.
///
/// Only the tree count is required. Everything else starts at the values
/// the canopy model is fitted with: every column considered at each split,
/// trees grown until pure, a full-size bootstrap, seed 42 and no
/// out-of-bag scoring.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) split_method: SplitMethod,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// # Errors
    ///
    /// [`RfError::InvalidTreeCount`] when `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::All,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            split_method: SplitMethod::Exact,
            seed: 42,
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 1.0,
        })
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Depth cap; the root sits at depth 0 and `None` grows until pure.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Nodes with fewer rows than this become leaves.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Splits leaving fewer rows than this on either side are skipped.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Master seed; every tree seed is drawn from it.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Bootstrap draws per tree, as a share of the training rows.
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Same settings, different tree count.
    ///
    /// # Errors
    ///
    /// [`RfError::InvalidTreeCount`] when `n_trees` is zero.
    pub fn with_n_trees(&self, n_trees: usize) -> Result<Self, RfError> {
        let mut config = Self::new(n_trees)?;
        config.max_features = self.max_features;
        config.max_depth = self.max_depth;
        config.min_samples_split = self.min_samples_split;
        config.min_samples_leaf = self.min_samples_leaf;
        config.split_method = self.split_method;
        config.seed = self.seed;
        config.oob_mode = self.oob_mode;
        config.bootstrap_fraction = self.bootstrap_fraction;
        Ok(config)
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Check the stopping rules against a table of `n_features` columns.
    pub(crate) fn growth_limits(&self, n_features: usize) -> Result<GrowthLimits, RfError> {
        if self.max_depth == Some(0) {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(RfError::InvalidMinSamplesLeaf { min_samples_leaf: 0 });
        }
        if !(self.bootstrap_fraction > 0.0 && self.bootstrap_fraction <= 1.0) {
            return Err(RfError::InvalidBootstrapFraction {
                fraction: self.bootstrap_fraction,
            });
        }
        Ok(GrowthLimits {
            split_method: self.split_method,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(n_features)?,
        })
    }

    /// Fit a forest to row-major `features` and their cover `targets`.
    ///
    /// `feature_names` labels the columns and travels with the model.
    ///
    /// # Errors
    ///
    /// Fails on an empty, ragged or non-finite table, on targets or names
    /// that do not match the rows, on any out-of-range setting, and with
    /// [`RfError::OobEvaluationFailed`] when scoring is on but every row
    /// was drawn by every tree.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
        feature_names: &[String],
    ) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, features, targets, feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::{MaxFeatures, RandomForestConfig};
    use crate::RfError;

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1).unwrap(), 1);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(7).unwrap(), 4);
        assert_eq!(MaxFeatures::All.resolve(9).unwrap(), 9);
        assert!(matches!(
            MaxFeatures::Fixed(12).resolve(9),
            Err(RfError::InvalidMaxFeatures { max_features: 12, n_features: 9 })
        ));
    }

    #[test]
    fn growth_limits_reject_bad_settings() {
        let base = RandomForestConfig::new(3).unwrap();
        assert!(base.growth_limits(4).is_ok());
        assert!(matches!(
            base.clone().with_max_depth(Some(0)).growth_limits(4),
            Err(RfError::InvalidMaxDepth { .. })
        ));
        assert!(matches!(
            base.clone().with_min_samples_split(1).growth_limits(4),
            Err(RfError::InvalidMinSamplesSplit { .. })
        ));
        assert!(matches!(
            base.clone().with_bootstrap_fraction(1.5).growth_limits(4),
            Err(RfError::InvalidBootstrapFraction { .. })
        ));
    }

    #[test]
    fn with_n_trees_keeps_other_settings() {
        let base = RandomForestConfig::new(3).unwrap().with_seed(9).with_max_depth(Some(4));
        let more = base.with_n_trees(30).unwrap();
        assert_eq!(more.n_trees(), 30);
        assert_eq!(more.seed, 9);
        assert_eq!(more.max_depth, Some(4));
        assert!(base.with_n_trees(0).is_err());
    }
}
