use std::path::PathBuf;

/// Everything that can go wrong while fitting, validating or storing a forest.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    // Hyper-parameters.
    #[error("a forest needs at least one tree, got {n_trees}")]
    InvalidTreeCount { n_trees: usize },

    #[error("tree-count range {min}..={max} step {step} has no candidates")]
    InvalidTreeRange { min: usize, max: usize, step: usize },

    #[error("the search must repeat at least once, got {runs} runs")]
    InvalidRunCount { runs: usize },

    #[error("max_depth must be positive, got {max_depth}")]
    InvalidMaxDepth { max_depth: usize },

    #[error("min_samples_split must be 2 or more, got {min_samples_split}")]
    InvalidMinSamplesSplit { min_samples_split: usize },

    #[error("min_samples_leaf must be positive, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf { min_samples_leaf: usize },

    /// `max_features` resolved outside `1..=n_features`.
    #[error("{max_features} candidate columns per split, table has {n_features}")]
    InvalidMaxFeatures { max_features: usize, n_features: usize },

    #[error("bootstrap fraction {fraction} is outside (0, 1]")]
    InvalidBootstrapFraction { fraction: f64 },

    // Training table.
    #[error("the training table has no rows")]
    EmptyDataset,

    #[error("the training table has no predictor columns")]
    ZeroFeatures,

    #[error("{targets} targets for {rows} rows")]
    TargetCountMismatch { rows: usize, targets: usize },

    #[error("row {sample_index} has {got} columns, expected {expected}")]
    FeatureCountMismatch {
        expected: usize,
        got: usize,
        sample_index: usize,
    },

    #[error("row {sample_index}, column {feature_index} is not finite")]
    NonFiniteValue {
        sample_index: usize,
        feature_index: usize,
    },

    #[error("target of row {sample_index} is not finite")]
    NonFiniteTarget { sample_index: usize },

    /// Two inputs that describe the same rows or columns differ in length.
    #[error("{what}: {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    // Prediction and scoring.
    #[error("model expects {expected} predictors per row, got {got}")]
    PredictionFeatureMismatch { expected: usize, got: usize },

    #[error("out-of-bag scoring failed: {reason}")]
    OobEvaluationFailed { reason: String },

    // Spatial hold-out.
    #[error("district {index} requested, only {n_districts} districts present")]
    UnknownDistrict { index: usize, n_districts: usize },

    #[error(
        "holding out \"{district}\" leaves {n_train} training rows and {n_validation} validation rows"
    )]
    EmptyHoldout {
        district: String,
        n_train: usize,
        n_validation: usize,
    },

    // Model files.
    #[error("could not encode the model")]
    SerializeModel { source: Box<bincode::ErrorKind> },

    #[error("{path} is not a readable model")]
    DeserializeModel {
        path: PathBuf,
        source: Box<bincode::ErrorKind>,
    },

    #[error("could not write model {path}")]
    WriteModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read model {path}")]
    ReadModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} uses model format {found}, this build reads format {expected}")]
    IncompatibleModelVersion {
        expected: u32,
        found: u32,
        path: PathBuf,
    },

    #[error("model {path} is inconsistent: {reason}")]
    InconsistentModel { path: PathBuf, reason: String },
}
