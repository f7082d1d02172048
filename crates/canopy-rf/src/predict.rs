use rayon::prelude::*;

use crate::error::RfError;
use crate::forest::RandomForest;

impl RandomForest {
    /// Mean of the member predictions for one predictor row.
    ///
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] when the row has the wrong width.
    pub fn predict(&self, row: &[f64]) -> Result<f64, RfError> {
        let members = self.predict_members(row)?;
        Ok(members.iter().sum::<f64>() / members.len() as f64)
    }

    /// Each tree's prediction for one row, in tree order.
    ///
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] when the row has the wrong width.
    pub fn predict_members(&self, row: &[f64]) -> Result<Vec<f64>, RfError> {
        if row.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        Ok(self.trees.iter().map(|t| t.predict_unchecked(row)).collect())
    }

    /// [`RandomForest::predict`] over many rows, in parallel.
    ///
    /// # Errors
    ///
    /// The first width mismatch encountered.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    /// [`RandomForest::predict_members`] over many rows, as `out[row][tree]`.
    ///
    /// # Errors
    ///
    /// The first width mismatch encountered.
    pub fn predict_members_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RfError> {
        rows.par_iter().map(|row| self.predict_members(row)).collect()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn trees(&self) -> &[crate::RegressionTree] {
        &self.trees
    }

    /// Column names in the order rows must supply them.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RandomForestConfig;
    use crate::RfError;

    #[test]
    fn prediction_is_the_member_mean() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i)]).collect();
        let cover: Vec<f64> = (0..30).map(|i| f64::from(i % 7) * 10.0).collect();
        let forest = RandomForestConfig::new(12)
            .unwrap()
            .fit(&rows, &cover, &["ndvi".to_string()])
            .unwrap()
            .into_forest();

        let members = forest.predict_members_batch(&rows).unwrap();
        let means = forest.predict_batch(&rows).unwrap();
        for (m, mean) in members.iter().zip(&means) {
            assert_eq!(m.len(), forest.trees().len());
            assert!((m.iter().sum::<f64>() / 12.0 - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn wrong_width_rejected() {
        let forest = RandomForestConfig::new(2)
            .unwrap()
            .fit(&[vec![1.0, 2.0], vec![3.0, 4.0]], &[1.0, 2.0], &["a".into(), "b".into()])
            .unwrap()
            .into_forest();
        assert!(matches!(
            forest.predict_members(&[1.0]),
            Err(RfError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }
}
