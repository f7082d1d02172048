//! Single-band GeoTIFF reading and writing.
//!
//! Georeferencing uses the ModelPixelScale and ModelTiepoint tags; nodata
//! uses the GDAL ASCII tag. Output is Deflate compressed at the highest
//! level, with horizontal differencing for integer layers and the
//! floating-point predictor for `f32` layers.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

use ndarray::Array2;
use tiff::decoder::{ChunkType, Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray8, Gray16, Gray32Float};
use tiff::encoder::compression::{Deflate, DeflateLevel};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::{Predictor, Tag};
use tracing::{debug, instrument};

use crate::error::IoError;
use crate::geo::{GeoTransform, TileBounds};
use crate::raster::{Pixel, Raster};
use crate::window::TileWindow;

/// Rows per strip in written files; windowed reads decode whole strips.
const ROWS_PER_STRIP: u32 = 16;

/// A pixel type that can be written as a single-band TIFF.
pub trait TiffPixel: Pixel {
    /// Encoder color type whose sample is `Self`.
    type Color: ColorType<Inner = Self>;
    /// Predictor tag written alongside [`TiffPixel::predict_row`] output.
    const PREDICTOR: Predictor;

    /// Replace one image row by its predictor-encoded form.
    fn predict_row(row: &mut [Self]);
}

impl TiffPixel for u8 {
    type Color = Gray8;
    const PREDICTOR: Predictor = Predictor::Horizontal;

    fn predict_row(row: &mut [Self]) {
        for c in (1..row.len()).rev() {
            row[c] = row[c].wrapping_sub(row[c - 1]);
        }
    }
}

impl TiffPixel for u16 {
    type Color = Gray16;
    const PREDICTOR: Predictor = Predictor::Horizontal;

    fn predict_row(row: &mut [Self]) {
        for c in (1..row.len()).rev() {
            row[c] = row[c].wrapping_sub(row[c - 1]);
        }
    }
}

impl TiffPixel for f32 {
    type Color = Gray32Float;
    const PREDICTOR: Predictor = Predictor::FloatingPoint;

    /// Split the row into big-endian byte planes, then difference the bytes.
    ///
    /// The encoder writes samples in native byte order, so the shuffled
    /// bytes are packed back with `from_ne_bytes` to land in the file as is.
    fn predict_row(row: &mut [Self]) {
        let n = row.len();
        let mut bytes = vec![0u8; n * 4];
        for (i, value) in row.iter().enumerate() {
            for (plane, byte) in value.to_be_bytes().into_iter().enumerate() {
                bytes[plane * n + i] = byte;
            }
        }
        for j in (1..bytes.len()).rev() {
            bytes[j] = bytes[j].wrapping_sub(bytes[j - 1]);
        }
        for (value, b) in row.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
        }
    }
}

fn convert<T: Pixel, S: Copy>(buf: Vec<S>, to_f64: impl Fn(S) -> f64) -> Vec<T> {
    buf.into_iter().map(|v| T::from_f64(to_f64(v))).collect()
}

fn decode_samples<T: Pixel>(result: DecodingResult, path: &Path) -> Result<Vec<T>, IoError> {
    Ok(match result {
        DecodingResult::U8(buf) => convert(buf, f64::from),
        DecodingResult::U16(buf) => convert(buf, f64::from),
        DecodingResult::U32(buf) => convert(buf, f64::from),
        DecodingResult::I8(buf) => convert(buf, f64::from),
        DecodingResult::I16(buf) => convert(buf, f64::from),
        DecodingResult::I32(buf) => convert(buf, f64::from),
        DecodingResult::F32(buf) => convert(buf, f64::from),
        DecodingResult::F64(buf) => convert(buf, |v| v),
        _ => {
            return Err(IoError::UnsupportedPixelType {
                path: path.to_path_buf(),
                detail: "64-bit integer samples".to_string(),
            });
        }
    })
}

fn multi_band(path: &Path, rows: usize, cols: usize, samples: usize) -> IoError {
    IoError::ShapeMismatch {
        what: format!("{} (multi-band rasters are not supported)", path.display()),
        expected_rows: rows,
        expected_cols: cols,
        rows: samples / cols.max(1),
        cols,
    }
}

/// Grid size, georeference and nodata of an opened GeoTIFF.
struct GridInfo {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

/// Read the georeferencing of an open decoder.
fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform, IoError> {
    let missing = || IoError::MissingGeoreference {
        path: path.to_path_buf(),
    };
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| missing())?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| missing())?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(missing());
    }
    // tiepoint: [I, J, K, X, Y, Z]; scale: [sx, sy, sz]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// Open `path` and read everything but the pixels.
fn open(path: &Path) -> Result<(Decoder<BufReader<File>>, GridInfo), IoError> {
    let file = File::open(path).map_err(|source| IoError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let tiff_err = |source| IoError::TiffDecode {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;
    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let transform = read_transform(&mut decoder, path)?;
    let nodata = match decoder.find_tag(Tag::GdalNodata).map_err(tiff_err)? {
        Some(value) => value
            .into_string()
            .map_err(tiff_err)?
            .trim_matches(char::from(0))
            .trim()
            .parse::<f64>()
            .ok(),
        None => None,
    };
    Ok((
        decoder,
        GridInfo {
            rows: height as usize,
            cols: width as usize,
            transform,
            nodata,
        },
    ))
}

/// Read the first band of a GeoTIFF.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | file missing or unreadable |
/// | [`IoError::TiffDecode`] | not a decodable TIFF |
/// | [`IoError::MissingGeoreference`] | no pixel-scale/tie-point tags |
/// | [`IoError::UnsupportedPixelType`] | 64-bit integer samples |
/// | [`IoError::ShapeMismatch`] | more than one sample per pixel |
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_geotiff<T: Pixel>(path: impl AsRef<Path>) -> Result<Raster<T>, IoError> {
    let path = path.as_ref();
    let (mut decoder, grid) = open(path)?;
    let image = decoder.read_image().map_err(|source| IoError::TiffDecode {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = decode_samples::<T>(image, path)?;
    if samples.len() != grid.rows * grid.cols {
        return Err(multi_band(path, grid.rows, grid.cols, samples.len()));
    }

    debug!(rows = grid.rows, cols = grid.cols, nodata = ?grid.nodata, "raster read");
    Ok(Raster::from_vec(samples, grid.rows, grid.cols, grid.transform)?.with_nodata(grid.nodata))
}

/// Source rows and columns of a `src_rows × src_cols` grid that `window` covers.
fn overlap(window: &TileWindow, src_rows: usize, src_cols: usize) -> (Range<usize>, Range<usize>) {
    let clamp = |off: i64, len: usize, extent: usize| {
        let start = off.clamp(0, extent as i64) as usize;
        let end = (off + len as i64).clamp(0, extent as i64) as usize;
        start..end.max(start)
    };
    (
        clamp(window.row_off, window.rows, src_rows),
        clamp(window.col_off, window.cols, src_cols),
    )
}

/// Chunk indices whose pixels intersect `rows × cols`, with each chunk's top-left pixel.
///
/// Strips span the full width, so they form a single chunk column.
fn intersecting_chunks(
    kind: ChunkType,
    chunk: (u32, u32),
    src_cols: usize,
    rows: &Range<usize>,
    cols: &Range<usize>,
) -> Vec<(u32, usize, usize)> {
    if rows.is_empty() || cols.is_empty() {
        return Vec::new();
    }
    let (chunk_w, chunk_h) = (chunk.0.max(1) as usize, chunk.1.max(1) as usize);
    let across = match kind {
        ChunkType::Strip => 1,
        ChunkType::Tile => src_cols.div_ceil(chunk_w),
    };
    let col_chunks = match kind {
        ChunkType::Strip => 0..1,
        ChunkType::Tile => cols.start / chunk_w..(cols.end - 1) / chunk_w + 1,
    };
    (rows.start / chunk_h..(rows.end - 1) / chunk_h + 1)
        .flat_map(|cr| {
            col_chunks
                .clone()
                .map(move |cc| ((cr * across + cc) as u32, cr * chunk_h, cc * chunk_w))
        })
        .collect()
}

/// Read the part of a GeoTIFF covering `bounds`, filling pixels outside the source with `fill`.
///
/// Only the strips or tiles that intersect the window are decoded.
///
/// # Errors
///
/// As [`read_geotiff`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_geotiff_window<T: Pixel>(
    path: impl AsRef<Path>,
    bounds: &TileBounds,
    fill: T,
) -> Result<Raster<T>, IoError> {
    let path = path.as_ref();
    let tiff_err = |source| IoError::TiffDecode {
        path: path.to_path_buf(),
        source,
    };
    let (mut decoder, grid) = open(path)?;
    let window = TileWindow::from_bounds(bounds, &grid.transform);
    let (rows, cols) = overlap(&window, grid.rows, grid.cols);

    let chunks = intersecting_chunks(
        decoder.get_chunk_type(),
        decoder.chunk_dimensions(),
        grid.cols,
        &rows,
        &cols,
    );
    let mut data = Array2::from_elem(window.shape(), fill);
    for &(index, top, left) in &chunks {
        let (width, height) = decoder.chunk_data_dimensions(index);
        let (width, height) = (width as usize, height as usize);
        let samples = decode_samples::<T>(decoder.read_chunk(index).map_err(tiff_err)?, path)?;
        if samples.len() != width * height {
            return Err(multi_band(path, height, width, samples.len()));
        }
        for r in rows.start.max(top)..rows.end.min(top + height) {
            let out_r = (r as i64 - window.row_off) as usize;
            for c in cols.start.max(left)..cols.end.min(left + width) {
                let out_c = (c as i64 - window.col_off) as usize;
                data[(out_r, out_c)] = samples[(r - top) * width + (c - left)];
            }
        }
    }

    debug!(rows = window.rows, cols = window.cols, chunks = chunks.len(), "window read");
    Ok(Raster::new(data, window.transform).with_nodata(grid.nodata))
}

/// Write a raster as a single-band GeoTIFF.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::OutputDirCreate`] | parent directory cannot be created |
/// | [`IoError::WriteFile`] | file cannot be created |
/// | [`IoError::TiffEncode`] | encoding failed |
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn write_geotiff<T>(raster: &Raster<T>, path: impl AsRef<Path>) -> Result<(), IoError>
where
    T: TiffPixel,
    [T]: TiffValue,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IoError::OutputDirCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| IoError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;
    let tiff_err = |source| IoError::TiffEncode {
        path: path.to_path_buf(),
        source,
    };

    let (rows, cols) = raster.shape();
    let mut samples: Vec<T> = raster.data().iter().copied().collect();
    if cols > 0 {
        samples.chunks_mut(cols).for_each(T::predict_row);
    }

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_err)?;
    let mut image = encoder
        .new_image_with_compression::<T::Color, _>(
            cols as u32,
            rows as u32,
            Deflate::with_level(DeflateLevel::Best),
        )
        .map_err(tiff_err)?;
    image.rows_per_strip(ROWS_PER_STRIP).map_err(tiff_err)?;

    let gt = raster.transform();
    let scale = [gt.pixel_width.abs(), gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    // Version 1.1.0 with two keys: projected model, pixel-is-area.
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];

    let dir = image.encoder();
    dir.write_tag(Tag::ModelPixelScaleTag, &scale[..]).map_err(tiff_err)?;
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..]).map_err(tiff_err)?;
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..]).map_err(tiff_err)?;
    if let Some(nodata) = raster.nodata() {
        dir.write_tag(Tag::GdalNodata, format!("{nodata}").as_str())
            .map_err(tiff_err)?;
    }
    dir.write_tag(Tag::Predictor, T::PREDICTOR.to_u16()).map_err(tiff_err)?;

    image.write_data(&samples).map_err(tiff_err)?;
    debug!(rows, cols, "raster written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tiff::decoder::{ChunkType, Decoder};
    use tiff::tags::{Predictor, Tag};

    use super::{intersecting_chunks, read_geotiff, read_geotiff_window, write_geotiff};
    use crate::geo::{GeoTransform, TileBounds};
    use crate::raster::Raster;

    fn sample_transform() -> GeoTransform {
        GeoTransform::new(600_000.0, 5_000_000.0, 30.0, -30.0)
    }

    fn predictor_of(path: &std::path::Path) -> u16 {
        let mut decoder = Decoder::new(std::fs::File::open(path).unwrap()).unwrap();
        decoder.get_tag_unsigned(Tag::Predictor).unwrap()
    }

    #[test]
    fn float_layer_keeps_values_and_georeference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tcc.tif");
        let data: Vec<f32> = (0..12).map(|v| v as f32 * 7.5).collect();
        let raster = Raster::from_vec(data.clone(), 3, 4, sample_transform())
            .unwrap()
            .with_nodata(Some(255.0));

        write_geotiff(&raster, &path).unwrap();
        let back = read_geotiff::<f32>(&path).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert_eq!(back.data().iter().copied().collect::<Vec<_>>(), data);
        assert_eq!(back.transform(), &sample_transform());
        assert_eq!(back.nodata(), Some(255.0));
    }

    #[test]
    fn float_layer_uses_floating_point_predictor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gap.tif");
        let data = vec![-3.25f32, 0.0, 1.0e-7, 98.5, f32::MAX, -0.0, 12.0, 12.0];
        write_geotiff(&Raster::from_vec(data.clone(), 2, 4, sample_transform()).unwrap(), &path)
            .unwrap();

        assert_eq!(predictor_of(&path), Predictor::FloatingPoint.to_u16());
        let back = read_geotiff::<f32>(&path).unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back.data().iter().copied().collect::<Vec<_>>()), bits(&data));
    }

    #[test]
    fn windowed_read_crops_by_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lc.tif");
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        write_geotiff(&Raster::from_vec(data, 4, 4, sample_transform()).unwrap(), &path).unwrap();

        let bounds = TileBounds::new(600_030.0, 4_999_910.0, 600_090.0, 4_999_970.0);
        let crop = read_geotiff_window::<f32>(&path, &bounds, -1.0).unwrap();
        assert_eq!(crop.shape(), (2, 2));
        assert_eq!(crop.get(0, 0), Some(5.0));
        assert_eq!(crop.get(1, 1), Some(10.0));
    }

    #[test]
    fn window_across_strip_boundary_matches_full_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tall.tif");
        let gt = GeoTransform::new(0.0, 500.0, 10.0, -10.0);
        let data: Vec<u16> = (0..50 * 6).map(|v| v as u16).collect();
        write_geotiff(&Raster::from_vec(data, 50, 6, gt).unwrap(), &path).unwrap();
        let full = read_geotiff::<u16>(&path).unwrap();

        // Rows 14..34 span three 16-row strips; the last column runs off the grid.
        let bounds = TileBounds::new(20.0, 160.0, 70.0, 360.0);
        let crop = read_geotiff_window::<u16>(&path, &bounds, u16::MAX).unwrap();
        assert_eq!(crop.shape(), (20, 5));
        for r in 0..20 {
            for c in 0..4 {
                assert_eq!(crop.get(r, c), full.get(r + 14, c + 2));
            }
            assert_eq!(crop.get(r, 4), Some(u16::MAX));
        }
    }

    #[test]
    fn window_off_the_grid_is_all_fill() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.tif");
        let raster = Raster::filled(3, 3, 7u8, sample_transform()).with_nodata(Some(0.0));
        write_geotiff(&raster, &path).unwrap();

        let bounds = TileBounds::new(500_000.0, 4_000_000.0, 500_060.0, 4_000_060.0);
        let crop = read_geotiff_window::<u8>(&path, &bounds, 0).unwrap();
        assert_eq!(crop.shape(), (2, 2));
        assert_eq!(crop.count_where(|v| v == 0), 4);
        assert_eq!(crop.nodata(), Some(0.0));
    }

    #[test]
    fn only_intersecting_chunks_are_selected() {
        // Strips of 16 rows: rows 20..40 touch strips 1 and 2.
        let strips = intersecting_chunks(ChunkType::Strip, (100, 16), 100, &(20..40), &(5..10));
        assert_eq!(strips, [(1, 16, 0), (2, 32, 0)]);

        // 256-pixel tiles over a 600-wide grid: three tiles per row.
        let tiles =
            intersecting_chunks(ChunkType::Tile, (256, 256), 600, &(250..260), &(520..540));
        assert_eq!(tiles, [(2, 0, 512), (5, 256, 512)]);

        assert!(intersecting_chunks(ChunkType::Strip, (100, 16), 100, &(5..5), &(0..10)).is_empty());
    }

    #[test]
    fn byte_layer_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("types.tif");
        let data: Vec<u8> = vec![1, 1, 2, 3, 255, 5, 0, 4, 4];
        let raster = Raster::from_vec(data.clone(), 3, 3, sample_transform())
            .unwrap()
            .with_nodata(Some(255.0));
        write_geotiff(&raster, &path).unwrap();
        assert_eq!(predictor_of(&path), Predictor::Horizontal.to_u16());
        let back = read_geotiff::<u8>(&path).unwrap();
        assert_eq!(back.data().iter().copied().collect::<Vec<_>>(), data);
        assert_eq!(back.nodata(), Some(255.0));
    }

    #[test]
    fn missing_file_reported() {
        let dir = TempDir::new().unwrap();
        let err = read_geotiff::<u8>(dir.path().join("nope.tif")).unwrap_err();
        assert!(matches!(err, crate::IoError::FileNotFound { .. }));
    }
}
