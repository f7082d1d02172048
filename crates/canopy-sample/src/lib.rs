//! Stratified, change-aware pixel sampling for canopy-cover model training.
//!
//! A tile's sample target is split between pixels whose canopy cover
//! changed over the sampling period and pixels that stayed stable, then
//! across land-cover classes in proportion to their eligible pixel counts.
//! Stable pixels are drawn uniformly; changing pixels are drawn with a
//! skew-normal bias toward large changes, which are rare.

mod error;
mod sampler;
mod skew;

use std::path::Path;

pub use error::SampleError;
pub use sampler::{ChangeGroup, ClassQuota, SamplePoint, SampleSet, SamplingLayers, StratifiedSampler};
pub use skew::{SkewNormal, draws_to_ranks};

/// Write `x,y,land_cover,group` rows for every selected pixel.
///
/// # Errors
///
/// Returns [`SampleError::Raster`] wrapping the CSV writer's error.
pub fn write_samples(path: impl AsRef<Path>, samples: &SampleSet) -> Result<(), SampleError> {
    canopy_io::write_records(path, &samples.points)?;
    Ok(())
}
