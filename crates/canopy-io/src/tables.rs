//! CSV training tables and result tables.
//!
//! Readers validate every cell. Writers create the parent directory and
//! take plain slices.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::IoError;

/// Name of the target column in `y_data.csv`.
pub const TARGET_COLUMN: &str = "target";

/// Name of the temporal-gap column that follows the predictors in every model.
pub const GAP_COLUMN: &str = "gap";

/// Predictor table (`x_data.csv`): numeric columns only.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    path: PathBuf,
    /// Column names in file order.
    pub names: Vec<String>,
    /// Row-major values.
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Keep only the named columns, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] when the header lacks one of `names`.
    pub fn select(&self, names: &[String]) -> Result<FeatureTable, IoError> {
        let indices = names
            .iter()
            .map(|name| column_index(&self.names, name, &self.path))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(n_columns = indices.len(), "feature columns selected");
        Ok(FeatureTable {
            path: self.path.clone(),
            names: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i]).collect())
                .collect(),
        })
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Target table (`y_data.csv`): a numeric `target` column plus any
/// provenance columns, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTable {
    path: PathBuf,
    columns: Vec<String>,
    records: Vec<Vec<String>>,
    target: Vec<f64>,
}

impl TargetTable {
    /// Column names in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw records in file order.
    #[must_use]
    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    /// Parsed target values.
    #[must_use]
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All values of a text column.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] when the header lacks `name`.
    pub fn column(&self, name: &str) -> Result<Vec<String>, IoError> {
        let idx = column_index(&self.columns, name, &self.path)?;
        Ok(self.records.iter().map(|r| r[idx].clone()).collect())
    }
}

fn column_index(columns: &[String], name: &str, path: &Path) -> Result<usize, IoError> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| IoError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })
}

/// Header plus raw records with a uniform column count.
fn read_raw(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), IoError> {
    let file = File::open(path).map_err(|source| IoError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |e: csv::Error| IoError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    };

    // flexible so row-length errors surface as InconsistentRowLength
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let header: Vec<String> = rdr.headers().map_err(csv_err)?.iter().map(String::from).collect();
    let expected = header.len();
    debug!(expected_cols = expected, "read CSV header");

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_err)?;
        if record.len() != expected {
            return Err(IoError::InconsistentRowLength {
                path: path.to_path_buf(),
                row_index,
                expected,
                got: record.len(),
            });
        }
        records.push(record.iter().map(String::from).collect());
    }

    if records.is_empty() {
        return Err(IoError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok((header, records))
}

fn parse_cell(raw: &str, path: &Path, row_index: usize, column: &str) -> Result<f64, IoError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| IoError::NonFiniteValue {
            path: path.to_path_buf(),
            row_index,
            column: column.to_string(),
            raw: raw.to_string(),
        })
}

/// Read a predictor table.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | file missing or unreadable |
/// | [`IoError::CsvParse`] | malformed CSV |
/// | [`IoError::EmptyTable`] | no data rows |
/// | [`IoError::InconsistentRowLength`] | row width differs from the header |
/// | [`IoError::NonFiniteValue`] | a cell is not a finite number |
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_feature_table(path: impl AsRef<Path>) -> Result<FeatureTable, IoError> {
    let path = path.as_ref();
    let (names, records) = read_raw(path)?;
    let rows = records
        .iter()
        .enumerate()
        .map(|(row_index, record)| {
            record
                .iter()
                .zip(&names)
                .map(|(raw, column)| parse_cell(raw, path, row_index, column))
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(n_samples = rows.len(), n_features = names.len(), "feature table loaded");
    Ok(FeatureTable {
        path: path.to_path_buf(),
        names,
        rows,
    })
}

/// Read a target table.
///
/// # Errors
///
/// As [`read_feature_table`], plus [`IoError::MissingColumn`] when there is
/// no `target` column. Only the target column must be numeric.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_target_table(path: impl AsRef<Path>) -> Result<TargetTable, IoError> {
    let path = path.as_ref();
    let (columns, records) = read_raw(path)?;
    let idx = column_index(&columns, TARGET_COLUMN, path)?;
    let target = records
        .iter()
        .enumerate()
        .map(|(row_index, record)| parse_cell(&record[idx], path, row_index, TARGET_COLUMN))
        .collect::<Result<Vec<_>, _>>()?;
    info!(n_samples = target.len(), "target table loaded");
    Ok(TargetTable {
        path: path.to_path_buf(),
        columns,
        records,
        target,
    })
}

/// Read `x_data.csv` and `y_data.csv` from `dir`, checking they describe the same rows.
///
/// # Errors
///
/// Errors of either reader, plus [`IoError::RowCountMismatch`].
pub fn read_training_tables(dir: &Path) -> Result<(FeatureTable, TargetTable), IoError> {
    let x_path = dir.join("x_data.csv");
    let y_path = dir.join("y_data.csv");
    let features = read_feature_table(&x_path)?;
    let targets = read_target_table(&y_path)?;
    if features.len() != targets.len() {
        return Err(IoError::RowCountMismatch {
            left: x_path,
            left_rows: features.len(),
            right: y_path,
            right_rows: targets.len(),
        });
    }
    Ok((features, targets))
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>, IoError> {
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
    Ok(csv::Writer::from_writer(file))
}

fn finish(mut wtr: csv::Writer<File>, path: &Path) -> Result<(), IoError> {
    wtr.flush().map_err(|source| IoError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Write serializable rows with a header derived from the row type.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::OutputDirCreate`] | parent directory cannot be created |
/// | [`IoError::WriteFile`] | file cannot be created or flushed |
/// | [`IoError::CsvWrite`] | a row cannot be serialized |
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn write_records<S: Serialize>(
    path: impl AsRef<Path>,
    rows: impl IntoIterator<Item = S>,
) -> Result<(), IoError> {
    let path = path.as_ref();
    let mut wtr = create_writer(path)?;
    let mut n_rows = 0usize;
    for row in rows {
        wtr.serialize(row).map_err(|source| IoError::CsvWrite {
            path: path.to_path_buf(),
            source,
        })?;
        n_rows += 1;
    }
    finish(wtr, path)?;
    info!(n_rows, "table written");
    Ok(())
}

fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<(), IoError> {
    let mut wtr = create_writer(path)?;
    let write_err = |source| IoError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };
    wtr.write_record(header).map_err(write_err)?;
    for row in rows {
        wtr.write_record(row).map_err(write_err)?;
    }
    finish(wtr, path)?;
    info!(path = %path.display(), n_rows = rows.len(), "table written");
    Ok(())
}

#[derive(Serialize)]
struct ImportanceRow<'a> {
    variables: &'a str,
    importance: f64,
}

/// Write `variables,importance` rows.
///
/// # Errors
///
/// As [`write_records`].
pub fn write_variable_importance(
    path: impl AsRef<Path>,
    names: &[String],
    importances: &[f64],
) -> Result<(), IoError> {
    write_records(
        path,
        names.iter().zip(importances).map(|(name, &importance)| ImportanceRow {
            variables: name,
            importance,
        }),
    )
}

/// One row of the tree-count summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeCountRow {
    /// Candidate tree count.
    pub nr_trees: usize,
    /// Mean OOB R² across runs.
    pub oob_mean: f64,
    /// Population standard deviation of OOB R².
    pub oob_sd: f64,
    /// Mean OOB MSE across runs.
    pub mse_mean: f64,
    /// Population standard deviation of OOB MSE.
    pub mse_sd: f64,
}

/// Write the per-candidate summary table.
///
/// # Errors
///
/// As [`write_records`].
pub fn write_tree_count_summary(path: impl AsRef<Path>, rows: &[TreeCountRow]) -> Result<(), IoError> {
    write_records(path, rows)
}

/// Write the per-run score matrix: `nr_trees,run0,run1,…`.
///
/// `scores[c][r]` is the score of candidate `c` in run `r`.
///
/// # Errors
///
/// As [`write_records`].
pub fn write_tree_count_runs(
    path: impl AsRef<Path>,
    candidates: &[usize],
    scores: &[Vec<f64>],
) -> Result<(), IoError> {
    let n_runs = scores.first().map_or(0, Vec::len);
    let header: Vec<String> = std::iter::once("nr_trees".to_string())
        .chain((0..n_runs).map(|r| format!("run{r}")))
        .collect();
    let rows: Vec<Vec<String>> = candidates
        .iter()
        .zip(scores)
        .map(|(n, runs)| {
            std::iter::once(n.to_string())
                .chain(runs.iter().map(f64::to_string))
                .collect()
        })
        .collect();
    write_table(path.as_ref(), &header, &rows)
}

/// Write the held-out rows of `targets` with `prediction` and `confidence` appended.
///
/// # Errors
///
/// As [`write_records`].
pub fn write_quality_assessment(
    path: impl AsRef<Path>,
    targets: &TargetTable,
    rows: &[usize],
    predictions: &[f64],
    confidence: &[f64],
) -> Result<(), IoError> {
    let mut header = targets.columns().to_vec();
    header.push("prediction".to_string());
    header.push("confidence".to_string());
    let body: Vec<Vec<String>> = rows
        .iter()
        .zip(predictions.iter().zip(confidence))
        .map(|(&row, (p, c))| {
            let mut record = targets.records()[row].clone();
            record.push(p.to_string());
            record.push(c.to_string());
            record
        })
        .collect();
    write_table(path.as_ref(), &header, &body)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn feature_table_parses_numbers() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.csv", "elev,ndvi,gap\n10.5,0.3,1\n12,0.7,2\n");
        let table = read_feature_table(&path).unwrap();
        assert_eq!(table.names, ["elev", "ndvi", "gap"]);
        assert_eq!(table.rows, vec![vec![10.5, 0.3, 1.0], vec![12.0, 0.7, 2.0]]);
    }

    #[test]
    fn feature_columns_selected_by_name() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.csv", "elev,ndvi,extra,gap\n10,0.3,9,1\n12,0.7,9,2\n");
        let table = read_feature_table(&path).unwrap();

        let wanted = ["ndvi".to_string(), "elev".to_string(), GAP_COLUMN.to_string()];
        let picked = table.select(&wanted).unwrap();
        assert_eq!(picked.names, wanted);
        assert_eq!(picked.rows, vec![vec![0.3, 10.0, 1.0], vec![0.7, 12.0, 2.0]]);

        match table.select(&["slope".to_string()]).unwrap_err() {
            IoError::MissingColumn { column, path: p } => {
                assert_eq!(column, "slope");
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_feature_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.csv", "a,b\n1,2\n3,oops\n");
        match read_feature_table(&path).unwrap_err() {
            IoError::NonFiniteValue { row_index, column, raw, .. } => {
                assert_eq!((row_index, column.as_str(), raw.as_str()), (1, "b", "oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ragged_rows_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.csv", "a,b\n1,2\n3\n");
        assert!(matches!(
            read_feature_table(&path),
            Err(IoError::InconsistentRowLength { row_index: 1, expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.csv", "a,b\n");
        assert!(matches!(read_feature_table(&path), Err(IoError::EmptyTable { .. })));
    }

    #[test]
    fn target_table_keeps_text_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "y.csv", "district,country,target\nA,north,40\nB,south,55.5\n");
        let table = read_target_table(&path).unwrap();
        assert_eq!(table.target(), &[40.0, 55.5]);
        assert_eq!(table.column("country").unwrap(), ["north", "south"]);
        assert!(matches!(table.column("region"), Err(IoError::MissingColumn { .. })));
    }

    #[test]
    fn target_column_required() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "y.csv", "district,value\nA,1\n");
        assert!(matches!(read_target_table(&path), Err(IoError::MissingColumn { .. })));
    }

    #[test]
    fn training_tables_must_align() {
        let dir = TempDir::new().unwrap();
        write(&dir, "x_data.csv", "a\n1\n2\n3\n");
        write(&dir, "y_data.csv", "target\n1\n2\n");
        assert!(matches!(
            read_training_tables(dir.path()),
            Err(IoError::RowCountMismatch { left_rows: 3, right_rows: 2, .. })
        ));
    }

    #[test]
    fn quality_assessment_appends_columns() {
        let dir = TempDir::new().unwrap();
        let y = write(&dir, "y.csv", "district,country,target\nA,n,10\nB,n,20\nA,n,30\n");
        let table = read_target_table(&y).unwrap();
        let out = dir.path().join("out").join("0000_quality_assessment.csv");
        write_quality_assessment(&out, &table, &[0, 2], &[12.5, 28.0], &[1.5, 0.25]).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "district,country,target,prediction,confidence\nA,n,10,12.5,1.5\nA,n,30,28,0.25\n"
        );
    }

    #[test]
    fn tree_count_tables() {
        let dir = TempDir::new().unwrap();
        let summary = dir.path().join("nr_trees-summary.csv");
        write_tree_count_summary(
            &summary,
            &[TreeCountRow { nr_trees: 10, oob_mean: 0.5, oob_sd: 0.1, mse_mean: 4.0, mse_sd: 1.0 }],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&summary).unwrap(),
            "nr_trees,oob_mean,oob_sd,mse_mean,mse_sd\n10,0.5,0.1,4.0,1.0\n"
        );

        let runs = dir.path().join("nr_trees-all_runs.csv");
        write_tree_count_runs(&runs, &[10, 20], &[vec![0.5, 0.25], vec![0.75, 1.0]]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&runs).unwrap(),
            "nr_trees,run0,run1\n10,0.5,0.25\n20,0.75,1\n"
        );
    }

    #[test]
    fn importance_table_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("variable_importance.csv");
        write_variable_importance(&path, &["elev".to_string(), "gap".to_string()], &[0.75, 0.25])
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "variables,importance\nelev,0.75\ngap,0.25\n"
        );
    }
}
