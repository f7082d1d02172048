//! I/O error types for canopy-io.

use std::path::PathBuf;

/// Errors from configuration, raster, tile-index and table I/O.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when an input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the YAML configuration cannot be parsed.
    #[error("cannot parse configuration {path}")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// Returned when a subcommand needs a configuration key that is absent.
    #[error("missing configuration key `{key}` in {path}")]
    MissingConfigKey {
        /// Dotted key name.
        key: String,
        /// Path to the configuration file.
        path: PathBuf,
    },

    /// Returned when a comma-separated year list holds a non-integer entry.
    #[error("invalid year \"{raw}\" in list \"{list}\"")]
    InvalidYearList {
        /// The full list as given.
        list: String,
        /// The entry that failed to parse.
        raw: String,
    },

    /// Returned when a tile index is outside the tile collection.
    #[error("tile index {index} out of range, {path} holds {n_tiles} tiles")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of tiles available.
        n_tiles: usize,
        /// Path to the tile collection.
        path: PathBuf,
    },

    /// Returned when the tile collection is not a usable GeoJSON FeatureCollection.
    #[error("cannot read tiles from {path}: {reason}")]
    TileParse {
        /// Path to the tile collection.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// Returned when a GeoTIFF cannot be decoded.
    #[error("cannot decode GeoTIFF {path}")]
    TiffDecode {
        /// Path to the raster.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned when a GeoTIFF cannot be encoded.
    #[error("cannot encode GeoTIFF {path}")]
    TiffEncode {
        /// Path to the raster.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned when a GeoTIFF has a sample layout this crate does not read.
    #[error("unsupported pixel layout in {path}: {detail}")]
    UnsupportedPixelType {
        /// Path to the raster.
        path: PathBuf,
        /// Description of the layout.
        detail: String,
    },

    /// Returned when a GeoTIFF lacks the pixel-scale or tie-point tags.
    #[error("missing georeferencing tags in {path}")]
    MissingGeoreference {
        /// Path to the raster.
        path: PathBuf,
    },

    /// Returned when rasters used together do not share a grid.
    #[error("{what}: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        /// Which raster disagreed.
        what: String,
        /// Expected row count.
        expected_rows: usize,
        /// Expected column count.
        expected_cols: usize,
        /// Actual row count.
        rows: usize,
        /// Actual column count.
        cols: usize,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a CSV file contains a header but zero data rows.
    #[error("empty table (no data rows) in {path}")]
    EmptyTable {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a required column is absent from a CSV header.
    #[error("column `{column}` not found in {path}")]
    MissingColumn {
        /// Column name.
        column: String,
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns.
        expected: usize,
        /// Actual number of columns.
        got: usize,
    },

    /// Returned when a numeric cell is NaN, Inf, or unparseable.
    #[error("non-finite value in {path}: row {row_index}, column `{column}`, raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: String,
        /// The raw string value.
        raw: String,
    },

    /// Returned when two tables describing the same rows differ in length.
    #[error("{left} has {left_rows} rows but {right} has {right_rows}")]
    RowCountMismatch {
        /// First table.
        left: PathBuf,
        /// Its row count.
        left_rows: usize,
        /// Second table.
        right: PathBuf,
        /// Its row count.
        right_rows: usize,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an output file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a CSV record cannot be written.
    #[error("cannot write CSV record to {path}")]
    CsvWrite {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
}
