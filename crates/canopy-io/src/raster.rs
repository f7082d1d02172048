//! In-memory single-band raster grids.

use std::fmt;

use ndarray::Array2;

use crate::error::IoError;
use crate::geo::GeoTransform;
use crate::window::TileWindow;

/// A numeric pixel type that can round-trip through `f64`.
pub trait Pixel: Copy + PartialEq + PartialOrd + Default + Send + Sync + fmt::Debug + 'static {
    /// Convert from `f64`, saturating at the type's range.
    fn from_f64(value: f64) -> Self;
    /// Widen to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_pixel {
    ($($t:ty),*) => {
        $(
            impl Pixel for $t {
                fn from_f64(value: f64) -> Self {
                    value as $t
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_pixel!(u8, u16, i16, i32, f32, f64);

/// A single-band raster: a row-major grid, its transform, and an optional nodata value.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    data: Array2<T>,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl<T: Pixel> Raster<T> {
    /// Wrap an existing array.
    #[must_use]
    pub fn new(data: Array2<T>, transform: GeoTransform) -> Self {
        Self {
            data,
            transform,
            nodata: None,
        }
    }

    /// A `rows × cols` raster filled with `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: T, transform: GeoTransform) -> Self {
        Self::new(Array2::from_elem((rows, cols), value), transform)
    }

    /// Build from a row-major vector.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ShapeMismatch`] when `data.len() != rows * cols`.
    pub fn from_vec(
        data: Vec<T>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
    ) -> Result<Self, IoError> {
        let len = data.len();
        let array = Array2::from_shape_vec((rows, cols), data).map_err(|_| IoError::ShapeMismatch {
            what: "pixel buffer".to_string(),
            expected_rows: rows,
            expected_cols: cols,
            rows: len / cols.max(1),
            cols,
        })?;
        Ok(Self::new(array, transform))
    }

    /// Set the nodata value.
    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Return `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Return the number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Return the number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Return the pixel at `(row, col)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.data.get((row, col)).copied()
    }

    /// Borrow the pixel array.
    #[must_use]
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Mutably borrow the pixel array.
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return its array.
    #[must_use]
    pub fn into_data(self) -> Array2<T> {
        self.data
    }

    /// Return the transform.
    #[must_use]
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Return the nodata value, if any.
    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Count pixels satisfying `pred`.
    pub fn count_where(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| pred(v)).count()
    }

    /// Apply `f` to every pixel, keeping transform and nodata.
    #[must_use]
    pub fn map<U: Pixel>(&self, f: impl FnMut(&T) -> U) -> Raster<U> {
        Raster {
            data: self.data.map(f),
            transform: self.transform,
            nodata: self.nodata,
        }
    }

    /// `true` when both rasters have the same shape.
    #[must_use]
    pub fn same_grid<U>(&self, other: &Raster<U>) -> bool {
        self.data.dim() == other.data.dim()
    }

    /// Fail unless `other` has this raster's shape.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ShapeMismatch`] naming `what`.
    pub fn ensure_same_shape<U>(&self, what: &str, other: &Raster<U>) -> Result<(), IoError> {
        let (expected_rows, expected_cols) = self.data.dim();
        let (rows, cols) = other.data.dim();
        if (rows, cols) != (expected_rows, expected_cols) {
            return Err(IoError::ShapeMismatch {
                what: what.to_string(),
                expected_rows,
                expected_cols,
                rows,
                cols,
            });
        }
        Ok(())
    }

    /// Crop `window` out of this raster.
    ///
    /// Pixels of the window that fall outside the source grid take `fill`.
    /// The result carries the window's transform.
    #[must_use]
    pub fn read_window(&self, window: &TileWindow, fill: T) -> Raster<T> {
        let (src_rows, src_cols) = self.shape();
        let data = Array2::from_shape_fn((window.rows, window.cols), |(r, c)| {
            let sr = window.row_off + r as i64;
            let sc = window.col_off + c as i64;
            if sr < 0 || sc < 0 || sr as usize >= src_rows || sc as usize >= src_cols {
                fill
            } else {
                self.data[(sr as usize, sc as usize)]
            }
        });
        Raster {
            data,
            transform: window.transform,
            nodata: self.nodata,
        }
    }
}
