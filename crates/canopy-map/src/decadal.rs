//! Canopy area change summed per decade.

use canopy_io::Raster;
use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::change_type::MAX_COVER;
use crate::error::MapError;
use crate::stack::{check_stack, pixel_series};

/// Largest decadal change and the decade that holds it.
#[derive(Debug, Clone)]
pub struct DecadalMaps {
    /// Largest summed area change over any decade, in pixel-area units.
    pub max_change: Raster<f32>,
    /// 1-based index of that decade in the configured list; 0 without change.
    pub max_decade: Raster<u8>,
}

/// Sum absolute year-to-year canopy area change per decade.
///
/// `layers[i]` holds cover (percent) for `years[i]`. A difference between
/// consecutive layers is attributed to the later year, and decades are
/// inclusive `(start, end)` year ranges. Outputs follow `pixel_area`'s grid.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MapError::EmptyStack`] | no layers |
/// | [`MapError::YearCountMismatch`] | `years` and `layers` differ in length |
/// | [`MapError::NoDecades`] | `decades` is empty |
/// | [`MapError::Raster`] | layers or pixel area differ in shape |
#[instrument(skip_all, fields(n_layers = layers.len(), n_decades = decades.len()))]
pub fn decadal_change(
    layers: &[Raster<f32>],
    years: &[i32],
    pixel_area: &Raster<f32>,
    decades: &[(i32, i32)],
) -> Result<DecadalMaps, MapError> {
    let (rows, cols) = check_stack(layers)?;
    if years.len() != layers.len() {
        return Err(MapError::YearCountMismatch {
            layers: layers.len(),
            years: years.len(),
        });
    }
    if decades.is_empty() {
        return Err(MapError::NoDecades);
    }
    pixel_area.ensure_same_shape("pixel area", &layers[0])?;

    // Decade index of each difference, if any.
    let buckets: Vec<Option<usize>> = years[1..]
        .iter()
        .map(|&y| decades.iter().position(|&(s, e)| (s..=e).contains(&y)))
        .collect();
    debug!(?buckets, "differences assigned to decades");

    let mut max_change = Array2::from_elem((rows, cols), 0f32);
    let mut max_decade = Array2::from_elem((rows, cols), 0u8);
    let mut series = vec![0.0; layers.len()];
    let mut sums = vec![0.0; decades.len()];

    for ((r, c), &area) in pixel_area.data().indexed_iter() {
        pixel_series(layers, r, c, Some(MAX_COVER), &mut series);
        let scale = 0.01 * f64::from(area);
        sums.fill(0.0);
        for (w, bucket) in series.windows(2).zip(&buckets) {
            if let Some(d) = bucket {
                sums[*d] += ((w[1] - w[0]) * scale).abs();
            }
        }
        // First decade wins ties.
        let (best, value) = sums
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        max_change[(r, c)] = value as f32;
        if value > 0.0 {
            max_decade[(r, c)] = u8::try_from(best + 1).unwrap_or(u8::MAX);
        }
    }

    let changed = max_decade.iter().filter(|&&d| d > 0).count();
    info!(changed, "decadal change computed");

    let transform = *pixel_area.transform();
    Ok(DecadalMaps {
        max_change: Raster::new(max_change, transform),
        max_decade: Raster::new(max_decade, transform),
    })
}
