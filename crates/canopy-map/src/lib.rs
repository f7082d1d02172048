//! Canopy-cover maps: tile prediction and change layers.
//!
//! [`predict_tile`] turns a fitted ensemble and a tile's predictor layers
//! into prediction and uncertainty rasters. The change modules work on a
//! co-registered time series of cover rasters:
//!
//! - [`classify_change_types`] labels each pixel stable, loss, gain, or
//!   disturbed from a Mann-Kendall test;
//! - [`change_duration`] counts the years needed to accumulate most of a
//!   pixel's loss or gain;
//! - [`decadal_change`] finds the decade with the largest canopy area change.

mod change_type;
mod decadal;
mod duration;
mod error;
mod predict;
mod special;
mod stack;
mod trend;

pub use change_type::{
    CLASS_NODATA, ChangeClass, ChangeTypeMaps, MAX_COVER, STATISTIC_NODATA, classify_change_types,
};
pub use decadal::{DecadalMaps, decadal_change};
pub use duration::{
    ChangeDirection, DURATION_NODATA, DurationConfig, DurationMaps, change_duration,
    years_to_fraction,
};
pub use error::MapError;
pub use predict::{PREDICTION_NODATA, TilePrediction, predict_tile, predictor_order};
pub use special::{erf, normal_cdf};
pub use trend::{MannKendall, Trend, mann_kendall};
