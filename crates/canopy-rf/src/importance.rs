//! Mean-decrease-in-impurity importance.

use serde::Serialize;

use crate::tree::RegressionTree;

/// Per-column importance in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportances {
    names: Vec<String>,
    values: Vec<f64>,
}

/// One column's place in the importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    pub name: String,
    pub importance: f64,
    /// 1 is the most important column.
    pub rank: usize,
}

impl FeatureImportances {
    /// Add up each tree's normalised squared-error shares and renormalise,
    /// so the values sum to 1 unless no tree ever split.
    pub(crate) fn from_trees(trees: &[RegressionTree], names: &[String]) -> Self {
        let mut values = vec![0.0; names.len()];
        for tree in trees {
            for (v, share) in values.iter_mut().zip(tree.sse_shares()) {
                *v += share;
            }
        }
        let total: f64 = values.iter().sum();
        if total > 0.0 {
            values.iter_mut().for_each(|v| *v /= total);
        }
        Self {
            names: names.to_vec(),
            values,
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Importance of the named column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Columns from most to least important; ties keep table order.
    #[must_use]
    pub fn ranked(&self) -> Vec<RankedFeature> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| self.values[b].total_cmp(&self.values[a]));
        order
            .into_iter()
            .enumerate()
            .map(|(i, col)| RankedFeature {
                name: self.names[col].clone(),
                importance: self.values[col],
                rank: i + 1,
            })
            .collect()
    }
}
