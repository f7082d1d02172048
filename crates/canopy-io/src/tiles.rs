//! Processing tiles read from a GeoJSON FeatureCollection.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, instrument};

use crate::error::IoError;
use crate::geo::TileBounds;

/// One processing tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Position in the collection.
    pub index: usize,
    /// Zero-padded identifier used in output file names.
    pub id: String,
    /// Bounding box of the tile geometry.
    pub bounds: TileBounds,
}

/// Bounding boxes of every feature in a tile collection.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | file missing or unreadable |
/// | [`IoError::TileParse`] | not JSON, no `features` array, or a feature without coordinates |
/// | [`IoError::IndexOutOfRange`] | [`TileIndex::tile`] asked for a missing index |
#[derive(Debug, Clone)]
pub struct TileIndex {
    path: PathBuf,
    bounds: Vec<TileBounds>,
}

impl TileIndex {
    /// Read the collection at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn read(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IoError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |reason: String| IoError::TileParse {
            path: path.to_path_buf(),
            reason,
        };

        let doc: Value = serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))?;
        let features = doc
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| parse_err("no `features` array".to_string()))?;

        let bounds = features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let geometry = feature
                    .get("geometry")
                    .filter(|g| !g.is_null())
                    .ok_or_else(|| parse_err(format!("feature {i} has no geometry")))?;
                let mut bb = TileBounds::empty();
                extend_geometry(geometry, &mut bb);
                if bb.is_empty() {
                    return Err(parse_err(format!("feature {i} has no coordinates")));
                }
                Ok(bb)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(n_tiles = bounds.len(), "tile index loaded");
        Ok(Self {
            path: path.to_path_buf(),
            bounds,
        })
    }

    /// Number of tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// `true` when the collection holds no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Identifier for `index`: zero-padded to the digit count of the tile count.
    #[must_use]
    pub fn tile_id(&self, index: usize) -> String {
        let width = self.bounds.len().to_string().len();
        format!("{index:0width$}")
    }

    /// The tile at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::IndexOutOfRange`] when `index >= len()`.
    pub fn tile(&self, index: usize) -> Result<Tile, IoError> {
        let bounds = *self.bounds.get(index).ok_or_else(|| IoError::IndexOutOfRange {
            index,
            n_tiles: self.bounds.len(),
            path: self.path.clone(),
        })?;
        Ok(Tile {
            index,
            id: self.tile_id(index),
            bounds,
        })
    }
}

fn extend_geometry(geometry: &Value, bb: &mut TileBounds) {
    if let Some(coords) = geometry.get("coordinates") {
        extend_coordinates(coords, bb);
    }
    if let Some(parts) = geometry.get("geometries").and_then(Value::as_array) {
        for part in parts {
            extend_geometry(part, bb);
        }
    }
}

fn extend_coordinates(value: &Value, bb: &mut TileBounds) {
    let Some(items) = value.as_array() else {
        return;
    };
    if let [x, y, ..] = items.as_slice()
        && let (Some(x), Some(y)) = (x.as_f64(), y.as_f64())
    {
        bb.include(x, y);
        return;
    }
    for item in items {
        extend_coordinates(item, bb);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::TileIndex;
    use crate::geo::TileBounds;

    fn square(x0: f64, y0: f64, size: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]]]
            }
        })
    }

    fn write_collection(dir: &TempDir, features: Vec<serde_json::Value>) -> std::path::PathBuf {
        let path = dir.path().join("tiles.geojson");
        let doc = serde_json::json!({ "type": "FeatureCollection", "features": features });
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    #[test]
    fn bounds_and_padded_ids() {
        let dir = TempDir::new().unwrap();
        let features = (0..12).map(|i| square(f64::from(i) * 100.0, 0.0, 100.0)).collect();
        let index = TileIndex::read(write_collection(&dir, features)).unwrap();

        assert_eq!(index.len(), 12);
        let tile = index.tile(3).unwrap();
        assert_eq!(tile.id, "03");
        assert_eq!(tile.bounds, TileBounds::new(300.0, 0.0, 400.0, 100.0));
        assert_eq!(index.tile_id(11), "11");
    }

    #[test]
    fn multipolygon_bounds_cover_all_parts() {
        let dir = TempDir::new().unwrap();
        let feature = serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                    [[[5.0, -2.0], [6.0, -2.0], [6.0, 3.0], [5.0, -2.0]]]
                ]
            }
        });
        let index = TileIndex::read(write_collection(&dir, vec![feature])).unwrap();
        assert_eq!(index.tile(0).unwrap().bounds, TileBounds::new(0.0, -2.0, 6.0, 3.0));
        assert_eq!(index.tile_id(0), "0");
    }

    #[test]
    fn out_of_range_index() {
        let dir = TempDir::new().unwrap();
        let index = TileIndex::read(write_collection(&dir, vec![square(0.0, 0.0, 1.0)])).unwrap();
        assert!(matches!(
            index.tile(1),
            Err(crate::IoError::IndexOutOfRange { index: 1, n_tiles: 1, .. })
        ));
    }

    #[test]
    fn not_a_collection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.geojson");
        std::fs::write(&path, r#"{"type": "Point", "coordinates": [0, 0]}"#).unwrap();
        assert!(matches!(TileIndex::read(&path), Err(crate::IoError::TileParse { .. })));
    }
}
