//! Number of years needed to accumulate most of a pixel's loss or gain.

use canopy_io::Raster;
use ndarray::Array2;
use tracing::{info, instrument};

use crate::change_type::ChangeClass;
use crate::error::MapError;
use crate::stack::{check_stack, pixel_series};

/// Nodata value of the duration layers.
pub const DURATION_NODATA: u8 = 255;

/// Which year-to-year differences count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    /// Decreases, as magnitudes.
    Loss,
    /// Increases.
    Gain,
}

/// Settings for [`change_duration`].
///
/// Defaults select class 3 for losses and class 4 for gains, with an 80 %
/// cumulative share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationConfig {
    pub(crate) loss_code: u8,
    pub(crate) gain_code: u8,
    pub(crate) fraction: f64,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            loss_code: ChangeClass::Loss.code(),
            gain_code: ChangeClass::Gain.code(),
            fraction: 0.8,
        }
    }
}

impl DurationConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Class code whose pixels get a loss duration.
    #[must_use]
    pub fn with_loss_code(mut self, code: u8) -> Self {
        self.loss_code = code;
        self
    }

    /// Class code whose pixels get a gain duration.
    #[must_use]
    pub fn with_gain_code(mut self, code: u8) -> Self {
        self.gain_code = code;
        self
    }

    /// Cumulative share to reach.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidFraction`] outside (0, 1].
    pub fn with_fraction(mut self, fraction: f64) -> Result<Self, MapError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(MapError::InvalidFraction { fraction });
        }
        self.fraction = fraction;
        Ok(self)
    }

    /// Return the loss class code.
    #[must_use]
    pub fn loss_code(&self) -> u8 {
        self.loss_code
    }

    /// Return the gain class code.
    #[must_use]
    pub fn gain_code(&self) -> u8 {
        self.gain_code
    }

    /// Return the cumulative share.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

/// Steps, smallest first, needed for the changes in `direction` to reach
/// `fraction` of their total. Zero when the series has no such change.
#[must_use]
pub fn years_to_fraction(series: &[f64], direction: ChangeDirection, fraction: f64) -> usize {
    let mut steps: Vec<f64> = series
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter_map(|d| match direction {
            ChangeDirection::Loss if d < 0.0 => Some(-d),
            ChangeDirection::Gain if d > 0.0 => Some(d),
            _ => None,
        })
        .collect();
    if steps.is_empty() {
        return 0;
    }
    steps.sort_by(f64::total_cmp);
    let total: f64 = steps.iter().sum();
    let mut cumulative = 0.0;
    for (i, step) in steps.iter().enumerate() {
        cumulative += step;
        if cumulative / total >= fraction {
            return i + 1;
        }
    }
    steps.len()
}

/// Loss and gain duration layers.
#[derive(Debug, Clone)]
pub struct DurationMaps {
    /// Years to reach the share of total loss.
    pub loss: Raster<u8>,
    /// Years to reach the share of total gain.
    pub gain: Raster<u8>,
}

/// Compute loss and gain durations over a cover time series.
///
/// Only pixels whose `change` class equals the configured code get a
/// non-zero value in the corresponding layer.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MapError::EmptyStack`] | no layers |
/// | [`MapError::Raster`] | layers or class map differ in shape |
#[instrument(skip_all, fields(n_layers = layers.len(), loss_code = config.loss_code, gain_code = config.gain_code))]
pub fn change_duration(
    layers: &[Raster<f32>],
    change: &Raster<u8>,
    config: &DurationConfig,
) -> Result<DurationMaps, MapError> {
    let (rows, cols) = check_stack(layers)?;
    layers[0].ensure_same_shape("change classes", change)?;

    let mut loss = Array2::from_elem((rows, cols), 0u8);
    let mut gain = Array2::from_elem((rows, cols), 0u8);
    let mut series = vec![0.0; layers.len()];
    let (mut n_loss, mut n_gain) = (0usize, 0usize);

    for ((r, c), &code) in change.data().indexed_iter() {
        let targets = [
            (code == config.loss_code, ChangeDirection::Loss),
            (code == config.gain_code, ChangeDirection::Gain),
        ];
        if !targets.iter().any(|(hit, _)| *hit) {
            continue;
        }
        pixel_series(layers, r, c, None, &mut series);
        for (hit, direction) in targets {
            if !hit {
                continue;
            }
            let years = years_to_fraction(&series, direction, config.fraction).min(254) as u8;
            match direction {
                ChangeDirection::Loss => {
                    loss[(r, c)] = years;
                    n_loss += 1;
                }
                ChangeDirection::Gain => {
                    gain[(r, c)] = years;
                    n_gain += 1;
                }
            }
        }
    }
    info!(n_loss, n_gain, "change durations computed");

    let transform = *change.transform();
    let nodata = Some(f64::from(DURATION_NODATA));
    Ok(DurationMaps {
        loss: Raster::new(loss, transform).with_nodata(nodata),
        gain: Raster::new(gain, transform).with_nodata(nodata),
    })
}
