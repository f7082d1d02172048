//! Pixel windows of a source grid covering a tile.

use crate::geo::{GeoTransform, TileBounds};

/// A pixel window of a source grid covering a tile's bounding box.
///
/// Offsets may be negative or run past the source extent; reads through
/// [`Raster::read_window`](crate::Raster::read_window) fill those pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileWindow {
    /// First source row (may be negative).
    pub row_off: i64,
    /// First source column (may be negative).
    pub col_off: i64,
    /// Window height in pixels.
    pub rows: usize,
    /// Window width in pixels.
    pub cols: usize,
    /// Transform of the cropped output, anchored at the tile's top-left corner.
    pub transform: GeoTransform,
}

impl TileWindow {
    /// Compute the window of `reference` that covers `bounds`.
    ///
    /// The first pixel is the one containing the center of the tile's
    /// top-left output pixel; the size is the tile extent divided by the
    /// reference resolution, rounded.
    #[must_use]
    pub fn from_bounds(bounds: &TileBounds, reference: &GeoTransform) -> Self {
        let res = reference.resolution();
        let (row, col) = reference.geo_to_pixel(bounds.min_x + res / 2.0, bounds.max_y - res / 2.0);
        let rows = ((bounds.max_y - bounds.min_y) / res).round().max(0.0) as usize;
        let cols = ((bounds.max_x - bounds.min_x) / res).round().max(0.0) as usize;
        Self {
            row_off: row.floor() as i64,
            col_off: col.floor() as i64,
            rows,
            cols,
            transform: GeoTransform::new(
                bounds.min_x,
                bounds.max_y,
                reference.pixel_width,
                reference.pixel_height,
            ),
        }
    }

    /// Return `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::TileWindow;
    use crate::geo::{GeoTransform, TileBounds};

    #[test]
    fn unaligned_bounds_snap_to_containing_pixel() {
        let gt = GeoTransform::new(0.0, 0.0, 30.0, -30.0);
        let w = TileWindow::from_bounds(&TileBounds::new(95.0, -400.0, 395.0, -100.0), &gt);
        // Center of the first output pixel is (110, -115): row 3, col 3.
        assert_eq!((w.row_off, w.col_off), (3, 3));
        assert_eq!(w.shape(), (10, 10));
        assert_eq!(w.transform.origin_x, 95.0);
        assert_eq!(w.transform.origin_y, -100.0);
    }

    #[test]
    fn bounds_left_of_grid_give_negative_offset() {
        let gt = GeoTransform::new(100.0, 100.0, 10.0, -10.0);
        let w = TileWindow::from_bounds(&TileBounds::new(70.0, 60.0, 110.0, 100.0), &gt);
        assert_eq!((w.row_off, w.col_off), (0, -3));
        assert_eq!(w.shape(), (4, 4));
    }
}
