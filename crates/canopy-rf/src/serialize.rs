//! On-disk model format: a bincode header followed by the forest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::RandomForest;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    format_version: u32,
    n_trees: usize,
    feature_names: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    header: Header,
    forest: RandomForest,
}

impl Header {
    fn describe(forest: &RandomForest) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            n_trees: forest.n_trees(),
            feature_names: forest.feature_names().to_vec(),
        }
    }

    /// First disagreement between the header and the forest it wraps.
    fn mismatch(&self, forest: &RandomForest) -> Option<String> {
        if self.n_trees != forest.n_trees() {
            return Some(format!("header lists {} trees, file holds {}", self.n_trees, forest.n_trees()));
        }
        if self.feature_names != forest.feature_names() {
            return Some("feature names differ between header and forest".to_string());
        }
        forest
            .trees
            .iter()
            .position(|t| t.n_features != forest.n_features)
            .map(|i| format!("tree {i} was grown on a different column count"))
    }
}

impl RandomForest {
    /// Write the model to `path`, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// [`RfError::WriteModel`] on an I/O failure and
    /// [`RfError::SerializeModel`] if encoding fails.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let write_err = |source| RfError::WriteModel {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = ModelFile {
            header: Header::describe(self),
            forest: self.clone(),
        };
        let bytes = bincode::serialize(&file).map_err(|source| RfError::SerializeModel { source })?;
        fs::write(path, &bytes).map_err(write_err)?;

        info!(bytes = bytes.len(), n_trees = self.n_trees(), "model written");
        Ok(())
    }

    /// Read a model written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ReadModel`] | the file cannot be read |
    /// | [`RfError::DeserializeModel`] | the bytes are not a model |
    /// | [`RfError::IncompatibleModelVersion`] | written by another format version |
    /// | [`RfError::InconsistentModel`] | header and forest disagree |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| RfError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let ModelFile { header, forest } =
            bincode::deserialize(&bytes).map_err(|source| RfError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if header.format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: header.format_version,
                path: path.to_path_buf(),
            });
        }
        if let Some(reason) = header.mismatch(&forest) {
            return Err(RfError::InconsistentModel {
                path: path.to_path_buf(),
                reason,
            });
        }

        debug!(n_trees = header.n_trees, features = ?header.feature_names, "model read");
        Ok(forest)
    }
}
