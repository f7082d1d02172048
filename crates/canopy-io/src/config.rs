//! YAML pipeline configuration.
//!
//! Every key is optional at parse time. Accessors return
//! [`IoError::MissingConfigKey`] when the subcommand asking for a value
//! finds it absent.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::IoError;
use crate::tables::GAP_COLUMN;

/// Decades used by decadal change mapping when the configuration lists none.
pub const DEFAULT_DECADES: [(i32, i32); 3] = [(1992, 1999), (2000, 2010), (2011, 2018)];

/// File name of the persisted model inside `model_dir` when `model.path` is unset.
pub const DEFAULT_MODEL_FILE: &str = "model.bin";

/// `boundaries` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Boundaries {
    /// Sampling tile polygons, relative to `data_dir`.
    pub country_polygon: Option<String>,
}

/// `variables` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variables {
    /// Predictor name to path pattern, in declaration order.
    #[serde(default)]
    pub predictors: serde_yaml::Mapping,
    /// Canopy-cover path pattern.
    pub canopy_cover: Option<String>,
    /// Forest-gain path pattern.
    pub forest_gains: Option<String>,
}

/// `forest_size` section driving the tree-count search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ForestSize {
    /// Smallest candidate tree count.
    pub min: usize,
    /// Largest candidate tree count (inclusive).
    pub max: usize,
    /// Increment between candidates.
    pub step_size: usize,
    /// Subsample size per run; the full table when absent.
    pub samples: Option<usize>,
    /// Number of repetitions.
    pub runs: usize,
}

/// `model` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSection {
    /// Path of the persisted model, relative to the configuration directory.
    pub path: Option<String>,
}

/// One predictor layer: its column name and year-patterned path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorLayer {
    /// Column name used for the layer in training tables.
    pub name: String,
    /// Path pattern; `*` stands for the year.
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    model_dir: Option<String>,
    sample_dir: Option<String>,
    data_dir: Option<String>,
    change_dir: Option<String>,
    canopy_dir: Option<String>,
    uncertainty_dir: Option<String>,
    quality_dir: Option<String>,
    mapping_mask: Option<String>,
    tiles: Option<String>,
    land_mask: Option<String>,
    pixel_area: Option<String>,
    #[serde(default)]
    boundaries: Boundaries,
    #[serde(default)]
    variables: Variables,
    forest_size: Option<ForestSize>,
    #[serde(default)]
    model: ModelSection,
    decades: Option<Vec<[i32; 2]>>,
}

/// Parsed configuration plus the location it was read from.
///
/// Relative paths resolve against the directory holding the configuration
/// file. Sampling inputs (`land_mask`, `boundaries.country_polygon` and the
/// `variables.*` layers when sampling) resolve under `data_dir` instead.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    path: PathBuf,
    base_dir: PathBuf,
    raw: RawConfig,
}

impl PipelineConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file missing or unreadable |
    /// | [`IoError::ConfigParse`] | not valid YAML for this schema |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IoError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = serde_yaml::from_str(&text).map_err(|source| IoError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        debug!(base_dir = %base_dir.display(), "configuration loaded");
        Ok(Self {
            path: path.to_path_buf(),
            base_dir,
            raw,
        })
    }

    /// Path the configuration was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn require<'a>(&self, value: Option<&'a String>, key: &str) -> Result<&'a str, IoError> {
        value.map(String::as_str).ok_or_else(|| IoError::MissingConfigKey {
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    fn under_base(&self, value: Option<&String>, key: &str) -> Result<PathBuf, IoError> {
        Ok(self.base_dir.join(self.require(value, key)?))
    }

    /// `model_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn model_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.model_dir.as_ref(), "model_dir")
    }

    /// `sample_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn sample_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.sample_dir.as_ref(), "sample_dir")
    }

    /// `data_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn data_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.data_dir.as_ref(), "data_dir")
    }

    /// `change_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn change_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.change_dir.as_ref(), "change_dir")
    }

    /// `canopy_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn canopy_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.canopy_dir.as_ref(), "canopy_dir")
    }

    /// `uncertainty_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn uncertainty_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.uncertainty_dir.as_ref(), "uncertainty_dir")
    }

    /// `quality_dir`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn quality_dir(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.quality_dir.as_ref(), "quality_dir")
    }

    /// `tiles`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn tiles_path(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.tiles.as_ref(), "tiles")
    }

    /// `mapping_mask`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn mapping_mask_path(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.mapping_mask.as_ref(), "mapping_mask")
    }

    /// `pixel_area`, resolved.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn pixel_area_path(&self) -> Result<PathBuf, IoError> {
        self.under_base(self.raw.pixel_area.as_ref(), "pixel_area")
    }

    /// `land_mask`, resolved under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when either key is absent.
    pub fn land_mask_path(&self) -> Result<PathBuf, IoError> {
        let name = self.require(self.raw.land_mask.as_ref(), "land_mask")?;
        Ok(self.data_dir()?.join(name))
    }

    /// `boundaries.country_polygon`, resolved under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when either key is absent.
    pub fn country_polygon_path(&self) -> Result<PathBuf, IoError> {
        let name = self.require(
            self.raw.boundaries.country_polygon.as_ref(),
            "boundaries.country_polygon",
        )?;
        Ok(self.data_dir()?.join(name))
    }

    /// Persisted model location: `model.path` when set, else `model_dir/model.bin`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when neither key is present.
    pub fn model_path(&self) -> Result<PathBuf, IoError> {
        match &self.raw.model.path {
            Some(path) => Ok(self.base_dir.join(path)),
            None => Ok(self.model_dir()?.join(DEFAULT_MODEL_FILE)),
        }
    }

    /// Predictor layers in declaration order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingConfigKey`] | `variables.predictors` absent or empty |
    /// | [`IoError::ConfigParse`] | a name or pattern is not a string |
    pub fn predictors(&self) -> Result<Vec<PredictorLayer>, IoError> {
        let mapping = &self.raw.variables.predictors;
        if mapping.is_empty() {
            return Err(IoError::MissingConfigKey {
                key: "variables.predictors".to_string(),
                path: self.path.clone(),
            });
        }
        let as_string = |value: &serde_yaml::Value| {
            serde_yaml::from_value::<String>(value.clone()).map_err(|source| IoError::ConfigParse {
                path: self.path.clone(),
                source,
            })
        };
        mapping
            .iter()
            .map(|(name, pattern)| {
                Ok(PredictorLayer {
                    name: as_string(name)?,
                    pattern: as_string(pattern)?,
                })
            })
            .collect()
    }

    /// Model feature columns: the predictor names followed by [`GAP_COLUMN`].
    ///
    /// # Errors
    ///
    /// As [`PipelineConfig::predictors`].
    pub fn feature_columns(&self) -> Result<Vec<String>, IoError> {
        let mut names: Vec<String> = self.predictors()?.into_iter().map(|p| p.name).collect();
        names.push(GAP_COLUMN.to_string());
        Ok(names)
    }

    /// Path pattern of the named predictor.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when no predictor has that name.
    pub fn predictor_pattern(&self, name: &str) -> Result<String, IoError> {
        self.predictors()?
            .into_iter()
            .find(|layer| layer.name == name)
            .map(|layer| layer.pattern)
            .ok_or_else(|| IoError::MissingConfigKey {
                key: format!("variables.predictors.{name}"),
                path: self.path.clone(),
            })
    }

    /// `variables.canopy_cover` pattern.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn canopy_cover_pattern(&self) -> Result<&str, IoError> {
        self.require(self.raw.variables.canopy_cover.as_ref(), "variables.canopy_cover")
    }

    /// `variables.forest_gains` pattern.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the key is absent.
    pub fn forest_gains_pattern(&self) -> Result<&str, IoError> {
        self.require(self.raw.variables.forest_gains.as_ref(), "variables.forest_gains")
    }

    /// Resolve a year pattern against the configuration directory.
    #[must_use]
    pub fn resolve(&self, pattern: &str, year: &str) -> PathBuf {
        self.base_dir.join(substitute_year(pattern, year))
    }

    /// Resolve a year pattern under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when `data_dir` is absent.
    pub fn resolve_data(&self, pattern: &str, year: &str) -> Result<PathBuf, IoError> {
        Ok(self.data_dir()?.join(substitute_year(pattern, year)))
    }

    /// `forest_size` section.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingConfigKey`] when the section is absent.
    pub fn forest_size(&self) -> Result<ForestSize, IoError> {
        self.raw.forest_size.ok_or_else(|| IoError::MissingConfigKey {
            key: "forest_size".to_string(),
            path: self.path.clone(),
        })
    }

    /// Decades as inclusive `(start, end)` year ranges.
    #[must_use]
    pub fn decades(&self) -> Vec<(i32, i32)> {
        match &self.raw.decades {
            Some(list) => list.iter().map(|[start, end]| (*start, *end)).collect(),
            None => DEFAULT_DECADES.to_vec(),
        }
    }
}

/// Replace every `*` in `pattern` with `year`.
#[must_use]
pub fn substitute_year(pattern: &str, year: &str) -> String {
    pattern.replace('*', year)
}

/// Parse a comma-separated list of years.
///
/// # Errors
///
/// Returns [`IoError::InvalidYearList`] for any entry that is not an integer.
pub fn parse_year_list(list: &str) -> Result<Vec<i32>, IoError> {
    split_list(list)
        .map(|item| {
            item.parse().map_err(|_| IoError::InvalidYearList {
                list: list.to_string(),
                raw: item.to_string(),
            })
        })
        .collect()
}

/// Split a comma-separated list of file paths.
#[must_use]
pub fn parse_file_list(list: &str) -> Vec<PathBuf> {
    split_list(list).map(PathBuf::from).collect()
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}
