//! Configuration, raster windowing, GeoTIFF and CSV I/O for the canopy pipeline.

mod config;
mod error;
mod geo;
mod geotiff;
mod raster;
mod tables;
mod tiles;
mod window;

pub use config::{
    Boundaries, DEFAULT_DECADES, DEFAULT_MODEL_FILE, ForestSize, ModelSection, PipelineConfig,
    PredictorLayer, Variables, parse_file_list, parse_year_list, substitute_year,
};
pub use error::IoError;
pub use geo::{GeoTransform, TileBounds};
pub use geotiff::{TiffPixel, read_geotiff, read_geotiff_window, write_geotiff};
pub use raster::{Pixel, Raster};
pub use tables::{
    FeatureTable, GAP_COLUMN, TARGET_COLUMN, TargetTable, TreeCountRow, read_feature_table,
    read_target_table, read_training_tables, write_quality_assessment, write_records,
    write_tree_count_runs, write_tree_count_summary, write_variable_importance,
};
pub use tiles::{Tile, TileIndex};
pub use window::TileWindow;
