//! Helpers for co-registered raster time series.

use canopy_io::Raster;

use crate::error::MapError;

/// Shape shared by every layer.
pub(crate) fn check_stack(layers: &[Raster<f32>]) -> Result<(usize, usize), MapError> {
    let first = layers.first().ok_or(MapError::EmptyStack)?;
    for (i, layer) in layers.iter().enumerate().skip(1) {
        first.ensure_same_shape(&format!("layer {i}"), layer)?;
    }
    Ok(first.shape())
}

/// Copy pixel `(row, col)` of each layer into `out`, zeroing values above `max`.
pub(crate) fn pixel_series(
    layers: &[Raster<f32>],
    row: usize,
    col: usize,
    max: Option<f32>,
    out: &mut [f64],
) {
    for (slot, layer) in out.iter_mut().zip(layers) {
        let v = layer.data()[(row, col)];
        *slot = match max {
            Some(limit) if v > limit => 0.0,
            _ => f64::from(v),
        };
    }
}
