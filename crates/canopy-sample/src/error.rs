//! Error types for canopy-sample.

/// Errors from stratified sampling.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Returned when input layers do not share the land mask's grid.
    #[error(transparent)]
    Raster(#[from] canopy_io::IoError),

    /// Returned when the skewed draw has zero range and cannot be rescaled.
    #[error("skewed draw of {quota} ranks for land cover {land_cover} has zero range")]
    DegenerateDraw {
        /// Land-cover class being sampled.
        land_cover: i32,
        /// Requested number of samples.
        quota: usize,
    },

    /// Returned when a sampling constant is zero, negative, or not finite.
    #[error("invalid sampler parameter `{name}`: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}
