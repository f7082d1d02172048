//! Per-pixel classification of canopy-cover change over a time series.

use canopy_io::Raster;
use ndarray::Array2;
use tracing::{info, instrument};

use crate::error::MapError;
use crate::stack::{check_stack, pixel_series};
use crate::trend::mann_kendall;

/// Nodata value of the class layer.
pub const CLASS_NODATA: u8 = 255;

/// Nodata value of the slope and p-value layers.
pub const STATISTIC_NODATA: f32 = 999.0;

/// Cover values above this are treated as 0.
pub const MAX_COVER: f32 = 100.0;

/// Change classes written to the class layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeClass {
    /// Never tree-covered.
    StableNonTree = 1,
    /// Constant, non-zero cover.
    StableTree = 2,
    /// Significant decreasing trend.
    Loss = 3,
    /// Significant increasing trend.
    Gain = 4,
    /// Changed without a significant trend.
    Disturbed = 5,
}

impl ChangeClass {
    /// Raster code of the class.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Class, slope and p-value layers.
#[derive(Debug, Clone)]
pub struct ChangeTypeMaps {
    /// Change class codes.
    pub class: Raster<u8>,
    /// Trend slope (Sen's slope, or ±1 for a single break); 999 where unchanged.
    pub slope: Raster<f32>,
    /// Trend p-value (1 for a single break); 999 where unchanged.
    pub p_value: Raster<f32>,
}

/// Slope and p-value of one pixel's series, `None` when the pixel never changes.
fn pixel_trend(series: &[f64], min: f64, max: f64) -> Result<Option<(f64, f64)>, MapError> {
    if min >= max {
        return Ok(None);
    }
    let breaks: Vec<f64> = series
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d != 0.0)
        .collect();
    if let [single] = breaks.as_slice() {
        return Ok(Some((single.signum(), 1.0)));
    }
    let mk = mann_kendall(series)?;
    Ok(Some((mk.slope, mk.p)))
}

/// Classify a pixel from its statistics.
fn classify(max: f64, trend: Option<(f64, f64)>, p_threshold: f64) -> ChangeClass {
    match trend {
        None if max == 0.0 => ChangeClass::StableNonTree,
        None => ChangeClass::StableTree,
        Some((slope, p)) if p < p_threshold && slope < 0.0 => ChangeClass::Loss,
        Some((slope, p)) if p < p_threshold && slope > 0.0 => ChangeClass::Gain,
        Some(_) => ChangeClass::Disturbed,
    }
}

/// Classify change for every pixel of a cover time series.
///
/// Layers are ordered in time and share one grid; values above 100 are
/// read as 0. Outputs carry the first layer's transform.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MapError::EmptyStack`] | no layers |
/// | [`MapError::Raster`] | layers differ in shape |
/// | [`MapError::InvalidThreshold`] | `p_threshold` outside (0, 1] |
#[instrument(skip_all, fields(n_layers = layers.len(), p_threshold = p_threshold))]
pub fn classify_change_types(
    layers: &[Raster<f32>],
    p_threshold: f64,
) -> Result<ChangeTypeMaps, MapError> {
    if !(p_threshold > 0.0 && p_threshold <= 1.0) {
        return Err(MapError::InvalidThreshold {
            p_value: p_threshold,
        });
    }
    let (rows, cols) = check_stack(layers)?;

    let mut class = Array2::from_elem((rows, cols), 0u8);
    let mut slope = Array2::from_elem((rows, cols), STATISTIC_NODATA);
    let mut p_value = Array2::from_elem((rows, cols), STATISTIC_NODATA);
    let mut series = vec![0.0; layers.len()];

    for r in 0..rows {
        for c in 0..cols {
            pixel_series(layers, r, c, Some(MAX_COVER), &mut series);
            let min = series.iter().copied().fold(f64::INFINITY, f64::min);
            let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let trend = pixel_trend(&series, min, max)?;
            if let Some((s, p)) = trend {
                slope[(r, c)] = s as f32;
                p_value[(r, c)] = p as f32;
            }
            class[(r, c)] = classify(max, trend, p_threshold).code();
        }
    }

    let transform = *layers[0].transform();
    let counts: Vec<usize> = (1..=5u8)
        .map(|code| class.iter().filter(|&&v| v == code).count())
        .collect();
    info!(?counts, "change types classified");

    Ok(ChangeTypeMaps {
        class: Raster::new(class, transform).with_nodata(Some(f64::from(CLASS_NODATA))),
        slope: Raster::new(slope, transform).with_nodata(Some(f64::from(STATISTIC_NODATA))),
        p_value: Raster::new(p_value, transform).with_nodata(Some(f64::from(STATISTIC_NODATA))),
    })
}
