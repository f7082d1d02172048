//! Leave-one-district-out validation.
//!
//! Training and validation rows never share a district.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use crate::ensemble::{Ensemble, EnsembleTrainer};
use crate::error::RfError;
use crate::oob::r2_score;
use crate::uncertainty::{confidence_half_width_95, prediction_spread};

/// Which extra rows to drop from training besides the held-out district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountryExclusion {
    /// Drop rows whose country field equals the held-out district's name.
    #[default]
    DistrictName,
    /// Drop every row from the held-out district's country.
    SameCountry,
    /// Drop only the held-out district itself.
    None,
}

/// A leave-one-district-out evaluation.
#[derive(Debug, Clone)]
pub struct SpatialHoldout {
    district: String,
    exclusion: CountryExclusion,
}

/// Row partition produced by [`SpatialHoldout::split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    /// Rows used for training.
    pub train: Vec<usize>,
    /// Rows of the held-out district.
    pub validation: Vec<usize>,
    /// Country of the first held-out row.
    pub country: String,
}

/// Predictions for the held-out district.
#[derive(Debug, Clone)]
pub struct HoldoutResult {
    /// The held-out district.
    pub district: String,
    /// Its country.
    pub country: String,
    /// Indices of the held-out rows in the input table.
    pub validation_indices: Vec<usize>,
    /// Aggregate prediction per held-out row.
    pub predictions: Vec<f64>,
    /// 95 % half-width per held-out row.
    pub confidence: Vec<f64>,
    /// Number of training rows.
    pub n_train: usize,
    /// Root-mean-square error on the held-out rows.
    pub rmse: f64,
    /// Coefficient of determination on the held-out rows.
    pub r2: f64,
}

/// Sorted distinct district names.
#[must_use]
pub fn unique_districts(districts: &[String]) -> Vec<String> {
    districts
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl SpatialHoldout {
    /// Hold out the named district.
    #[must_use]
    pub fn new(district: impl Into<String>) -> Self {
        Self {
            district: district.into(),
            exclusion: CountryExclusion::default(),
        }
    }

    /// Hold out the `index`-th district of the sorted distinct districts.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::UnknownDistrict`] when `index` is out of range.
    pub fn from_index(districts: &[String], index: usize) -> Result<Self, RfError> {
        let unique = unique_districts(districts);
        let district = unique.get(index).ok_or(RfError::UnknownDistrict {
            index,
            n_districts: unique.len(),
        })?;
        Ok(Self::new(district.clone()))
    }

    /// Set the country exclusion policy.
    #[must_use]
    pub fn with_country_exclusion(mut self, exclusion: CountryExclusion) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Return the held-out district.
    #[must_use]
    pub fn district(&self) -> &str {
        &self.district
    }

    /// Return the country exclusion policy.
    #[must_use]
    pub fn country_exclusion(&self) -> CountryExclusion {
        self.exclusion
    }

    /// Partition rows into training and validation sets.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::LengthMismatch`] | `countries.len() != districts.len()` |
    /// | [`RfError::EmptyHoldout`] | no training or no validation rows remain |
    pub fn split(&self, districts: &[String], countries: &[String]) -> Result<HoldoutSplit, RfError> {
        if countries.len() != districts.len() {
            return Err(RfError::LengthMismatch {
                what: "countries",
                expected: districts.len(),
                got: countries.len(),
            });
        }

        let validation: Vec<usize> = (0..districts.len())
            .filter(|&i| districts[i] == self.district)
            .collect();
        let country = validation
            .first()
            .map(|&i| countries[i].clone())
            .unwrap_or_default();

        let train: Vec<usize> = (0..districts.len())
            .filter(|&i| districts[i] != self.district)
            .filter(|&i| match self.exclusion {
                CountryExclusion::DistrictName => countries[i] != self.district,
                CountryExclusion::SameCountry => countries[i] != country,
                CountryExclusion::None => true,
            })
            .collect();

        if train.is_empty() || validation.is_empty() {
            return Err(RfError::EmptyHoldout {
                district: self.district.clone(),
                n_train: train.len(),
                n_validation: validation.len(),
            });
        }

        Ok(HoldoutSplit {
            train,
            validation,
            country,
        })
    }

    /// Train on the remaining rows and predict the held-out district.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SpatialHoldout::split`], [`RfError::LengthMismatch`]
    /// when `targets` or `districts` do not match `features`, and any
    /// training or prediction error of the trainer.
    #[instrument(skip_all, fields(district = %self.district, exclusion = ?self.exclusion))]
    pub fn evaluate<T: EnsembleTrainer>(
        &self,
        trainer: &T,
        features: &[Vec<f64>],
        targets: &[f64],
        districts: &[String],
        countries: &[String],
        feature_names: &[String],
    ) -> Result<HoldoutResult, RfError> {
        for (what, got) in [("targets", targets.len()), ("districts", districts.len())] {
            if got != features.len() {
                return Err(RfError::LengthMismatch {
                    what,
                    expected: features.len(),
                    got,
                });
            }
        }

        let split = self.split(districts, countries)?;

        let train_x: Vec<Vec<f64>> = split.train.iter().map(|&i| features[i].clone()).collect();
        let train_y: Vec<f64> = split.train.iter().map(|&i| targets[i]).collect();
        let valid_x: Vec<Vec<f64>> = split.validation.iter().map(|&i| features[i].clone()).collect();
        let valid_y: Vec<f64> = split.validation.iter().map(|&i| targets[i]).collect();

        info!(
            n_train = train_x.len(),
            n_validation = valid_x.len(),
            country = %split.country,
            "training hold-out model"
        );

        let outcome = trainer.fit_ensemble(&train_x, &train_y, feature_names)?;
        let ensemble = outcome.ensemble;
        let n_members = ensemble.n_members();

        let predictions = ensemble.predict_batch(&valid_x)?;
        let members = ensemble.predict_members_batch(&valid_x)?;
        let confidence: Vec<f64> = predictions
            .iter()
            .zip(&members)
            .map(|(&p, m)| confidence_half_width_95(prediction_spread(p, m), n_members))
            .collect();

        let rmse = (valid_y
            .iter()
            .zip(&predictions)
            .map(|(y, p)| (y - p).powi(2))
            .sum::<f64>()
            / valid_y.len() as f64)
            .sqrt();
        let r2 = r2_score(&valid_y, &predictions);

        info!(rmse, r2, "hold-out evaluation complete");

        Ok(HoldoutResult {
            district: self.district.clone(),
            country: split.country,
            validation_indices: split.validation,
            predictions,
            confidence,
            n_train: split.train.len(),
            rmse,
            r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CountryExclusion, SpatialHoldout, unique_districts};
    use crate::RfError;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unique_districts_sorted() {
        let d = strings(&["C", "A", "B", "A"]);
        assert_eq!(unique_districts(&d), strings(&["A", "B", "C"]));
    }

    #[test]
    fn from_index_addresses_sorted_list() {
        let d = strings(&["C", "A", "B"]);
        assert_eq!(SpatialHoldout::from_index(&d, 1).unwrap().district(), "B");
        assert!(matches!(
            SpatialHoldout::from_index(&d, 3),
            Err(RfError::UnknownDistrict { index: 3, n_districts: 3 })
        ));
    }

    #[test]
    fn literal_policy_drops_country_named_like_district() {
        let districts = strings(&["A", "A", "B", "C", "D"]);
        let countries = strings(&["X", "X", "A", "X", "Y"]);
        let split = SpatialHoldout::new("A").split(&districts, &countries).unwrap();
        assert_eq!(split.validation, vec![0, 1]);
        assert_eq!(split.train, vec![3, 4]);
        assert_eq!(split.country, "X");
    }

    #[test]
    fn same_country_policy_drops_sibling_districts() {
        let districts = strings(&["A", "A", "B", "C", "D"]);
        let countries = strings(&["X", "X", "A", "X", "Y"]);
        let split = SpatialHoldout::new("A")
            .with_country_exclusion(CountryExclusion::SameCountry)
            .split(&districts, &countries)
            .unwrap();
        assert_eq!(split.train, vec![2, 4]);
    }

    #[test]
    fn none_policy_keeps_every_other_district() {
        let districts = strings(&["A", "B", "C"]);
        let countries = strings(&["A", "A", "A"]);
        let split = SpatialHoldout::new("A")
            .with_country_exclusion(CountryExclusion::None)
            .split(&districts, &countries)
            .unwrap();
        assert_eq!(split.train, vec![1, 2]);
    }

    #[test]
    fn empty_holdout_reported() {
        let districts = strings(&["A", "B"]);
        let countries = strings(&["X", "X"]);
        let err = SpatialHoldout::new("Z").split(&districts, &countries).unwrap_err();
        assert!(matches!(err, RfError::EmptyHoldout { n_validation: 0, .. }));
        let err = SpatialHoldout::new("A")
            .with_country_exclusion(CountryExclusion::SameCountry)
            .split(&districts, &countries)
            .unwrap_err();
        assert!(matches!(err, RfError::EmptyHoldout { n_train: 0, .. }));
    }
}
