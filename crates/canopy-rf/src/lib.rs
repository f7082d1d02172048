//! Random Forest regression for canopy-cover modelling.
//!
//! CART regression trees grown on bootstrap samples in parallel, with
//! out-of-bag scoring, impurity-based feature importance, per-member
//! predictions for uncertainty estimates, a tree-count search, a
//! leave-one-district-out validator, and model persistence.

mod config;
mod ensemble;
mod error;
mod forest;
mod holdout;
mod importance;
mod node;
mod oob;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;
mod tree_count;
mod uncertainty;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use ensemble::{Ensemble, EnsembleTrainer, FitOutcome};
pub use error::RfError;
pub use forest::RandomForest;
pub use holdout::{CountryExclusion, HoldoutResult, HoldoutSplit, SpatialHoldout, unique_districts};
pub use importance::{FeatureImportances, RankedFeature};
pub use node::{FeatureIndex, Node, NodeIndex};
pub use oob::OobScore;
pub use result::{RandomForestResult, TrainingSummary};
pub use split::SplitMethod;
pub use tree::RegressionTree;
pub use tree_count::{TreeCountResult, TreeCountSearch, TreeCountSummary};
pub use uncertainty::{
    SpreadPrediction, Z_95, confidence_half_width_95, predict_with_spread, prediction_spread,
};
