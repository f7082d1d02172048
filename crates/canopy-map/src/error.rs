//! Error types for canopy-map.

/// Errors from map production.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Returned when an input raster is missing or misaligned.
    #[error(transparent)]
    Raster(#[from] canopy_io::IoError),

    /// Returned when the ensemble rejects the assembled predictor rows.
    #[error(transparent)]
    Model(#[from] canopy_rf::RfError),

    /// Returned when a trend test receives fewer than two observations.
    #[error("trend test needs at least 2 observations, got {len}")]
    EmptySeries {
        /// Number of observations supplied.
        len: usize,
    },

    /// Returned when a time-series computation receives no layers.
    #[error("no input layers supplied")]
    EmptyStack,

    /// Returned when the year list does not match the layer list.
    #[error("{layers} layers but {years} years")]
    YearCountMismatch {
        /// Number of layers.
        layers: usize,
        /// Number of years.
        years: usize,
    },

    /// Returned when no decades are configured.
    #[error("no decades configured")]
    NoDecades,

    /// Returned when a cumulative-share threshold is outside (0, 1].
    #[error("fraction must be in (0, 1], got {fraction}")]
    InvalidFraction {
        /// Rejected value.
        fraction: f64,
    },

    /// Returned when a significance threshold is outside (0, 1].
    #[error("significance threshold must be in (0, 1], got {p_value}")]
    InvalidThreshold {
        /// Rejected value.
        p_value: f64,
    },

    /// Returned when the model's feature columns are not the configured predictors plus gap.
    #[error("model was trained on {model:?}, configuration supplies {configured:?} plus the gap column")]
    FeatureNameMismatch {
        /// Feature names stored with the model.
        model: Vec<String>,
        /// Predictor names from the configuration.
        configured: Vec<String>,
    },
}
