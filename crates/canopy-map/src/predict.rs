//! Per-tile canopy-cover prediction.

use canopy_io::{GAP_COLUMN, Raster};
use canopy_rf::{Ensemble, predict_with_spread};
use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::error::MapError;

/// Nodata value of the prediction and uncertainty layers.
pub const PREDICTION_NODATA: f32 = 255.0;

/// Rows handed to the ensemble per call.
const CHUNK_ROWS: usize = 1 << 16;

/// Prediction and uncertainty layers of one tile.
#[derive(Debug, Clone)]
pub struct TilePrediction {
    /// Ensemble mean.
    pub prediction: Raster<f32>,
    /// Unscaled member spread.
    pub uncertainty: Raster<f32>,
    /// Pixels that received a value.
    pub n_predicted: usize,
}

/// Order in which to read the configured predictor layers for a model.
///
/// `model_features` are the column names the model was fitted on and must
/// be a permutation of `configured` followed by [`GAP_COLUMN`]. Entry `i` of
/// the result is the index into `configured` of the model's column `i`.
///
/// # Errors
///
/// [`MapError::FeatureNameMismatch`] when the names differ in any way other
/// than order.
pub fn predictor_order(
    model_features: &[String],
    configured: &[String],
) -> Result<Vec<usize>, MapError> {
    let mismatch = || MapError::FeatureNameMismatch {
        model: model_features.to_vec(),
        configured: configured.to_vec(),
    };
    let Some((gap, named)) = model_features.split_last() else {
        return Err(mismatch());
    };
    if gap != GAP_COLUMN || named.len() != configured.len() {
        return Err(mismatch());
    }

    let mut used = vec![false; configured.len()];
    let mut order = Vec::with_capacity(named.len());
    for name in named {
        let i = configured
            .iter()
            .position(|c| c == name)
            .filter(|&i| !used[i])
            .ok_or_else(mismatch)?;
        used[i] = true;
        order.push(i);
    }
    if order.iter().enumerate().any(|(pos, &i)| pos != i) {
        debug!(?order, "predictor layers reordered to match the model");
    }
    Ok(order)
}

/// Predict canopy cover over the pixels where `mask` equals 1.
///
/// Each predictor row holds the pixel's value in every `predictors` layer,
/// in order, followed by `gap`. Both outputs use the mask's grid and carry
/// [`PREDICTION_NODATA`] outside the mask.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MapError::Raster`] | a predictor differs in shape from the mask |
/// | [`MapError::Model`] | the ensemble rejects the row width |
#[instrument(skip_all, fields(n_predictors = predictors.len(), gap = gap))]
pub fn predict_tile<E: Ensemble + ?Sized>(
    ensemble: &E,
    mask: &Raster<u8>,
    predictors: &[Raster<f32>],
    gap: f64,
) -> Result<TilePrediction, MapError> {
    for (i, layer) in predictors.iter().enumerate() {
        mask.ensure_same_shape(&format!("predictor {i}"), layer)?;
    }

    let pixels: Vec<(usize, usize)> = mask
        .data()
        .indexed_iter()
        .filter_map(|(idx, &v)| (v == 1).then_some(idx))
        .collect();
    debug!(n_pixels = pixels.len(), "mask pixels selected");

    let mut prediction = Array2::from_elem(mask.shape(), PREDICTION_NODATA);
    let mut uncertainty = Array2::from_elem(mask.shape(), PREDICTION_NODATA);

    for chunk in pixels.chunks(CHUNK_ROWS) {
        let rows: Vec<Vec<f64>> = chunk
            .iter()
            .map(|&idx| {
                predictors
                    .iter()
                    .map(|p| f64::from(p.data()[idx]))
                    .chain(std::iter::once(gap))
                    .collect()
            })
            .collect();
        let estimates = predict_with_spread(ensemble, &rows)?;
        for (&idx, estimate) in chunk.iter().zip(&estimates) {
            prediction[idx] = estimate.prediction as f32;
            uncertainty[idx] = estimate.spread as f32;
        }
    }
    info!(n_predicted = pixels.len(), "tile predicted");

    let transform = *mask.transform();
    let nodata = Some(f64::from(PREDICTION_NODATA));
    Ok(TilePrediction {
        prediction: Raster::new(prediction, transform).with_nodata(nodata),
        uncertainty: Raster::new(uncertainty, transform).with_nodata(nodata),
        n_predicted: pixels.len(),
    })
}
