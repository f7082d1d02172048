//! CART regression trees grown on bootstrap row sets.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::GrowthLimits;
use crate::error::RfError;
use crate::node::{Node, NodeIndex};
use crate::split::{TargetStats, find_best_split};

/// A fitted regression tree, stored as a flat node arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl RegressionTree {
    /// Grow a tree on `rows`, which index into column-major `columns` and
    /// `targets` and may repeat.
    pub(crate) fn grow(
        columns: &[Vec<f64>],
        targets: &[f64],
        rows: &[usize],
        limits: &GrowthLimits,
        seed: u64,
    ) -> Self {
        let mut grower = Grower {
            columns,
            targets,
            limits,
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        trace!(n_nodes = grower.nodes.len(), "tree grown");
        Self {
            nodes: grower.nodes,
            n_features: columns.len(),
        }
    }

    /// Cover estimate for one predictor row.
    ///
    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] when the row has the wrong width.
    pub fn predict(&self, row: &[f64]) -> Result<f64, RfError> {
        if row.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        Ok(self.predict_unchecked(row))
    }

    pub(crate) fn predict_unchecked(&self, row: &[f64]) -> f64 {
        let mut at = NodeIndex::ROOT;
        loop {
            match &self.nodes[at.index()] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    at = if row[feature.index()] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Share of this tree's total squared-error reduction credited to each
    /// column. Sums to 1, or is all zeros for a single-leaf tree.
    #[must_use]
    pub fn sse_shares(&self) -> Vec<f64> {
        let mut shares = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                sse_reduction,
                ..
            } = node
            {
                shares[feature.index()] += sse_reduction;
            }
        }
        let total: f64 = shares.iter().sum();
        if total > 0.0 {
            for s in &mut shares {
                *s /= total;
            }
        }
        shares
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Longest root-to-leaf path; a lone leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: NodeIndex) -> usize {
            match &nodes[at.index()] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, NodeIndex::ROOT)
    }
}

struct Grower<'a> {
    columns: &'a [Vec<f64>],
    targets: &'a [f64],
    limits: &'a GrowthLimits,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, rows: &[usize], depth: usize) -> NodeIndex {
        let stats = TargetStats::from_indices(self.targets, rows);
        let here = NodeIndex::new(self.nodes.len());
        self.nodes.push(Node::Leaf {
            value: stats.mean(),
            n_samples: rows.len(),
        });

        let stop = rows.len() < self.limits.min_samples_split
            || stats.sse() == 0.0
            || self.limits.max_depth.is_some_and(|d| depth >= d);
        if stop {
            return here;
        }
        let Some(split) = find_best_split(
            self.columns,
            self.targets,
            rows,
            self.limits.split_method,
            self.limits.max_features,
            self.limits.min_samples_leaf,
            &mut self.rng,
        ) else {
            return here;
        };

        // Children land after `here`, so the leaf is rewritten in place.
        let left = self.grow(&split.left_indices, depth + 1);
        let right = self.grow(&split.right_indices, depth + 1);
        self.nodes[here.index()] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            n_samples: rows.len(),
            sse_reduction: split.sse_reduction,
        };
        here
    }
}

#[cfg(test)]
mod tests {
    use super::RegressionTree;
    use crate::config::GrowthLimits;
    use crate::split::SplitMethod;

    fn limits(max_depth: Option<usize>, split_method: SplitMethod) -> GrowthLimits {
        GrowthLimits {
            split_method,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    /// Cover jumps from 10 to 70 at x = 10; the second column is constant.
    fn step_columns() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let targets = x.iter().map(|&v| if v < 10.0 { 10.0 } else { 70.0 }).collect();
        (vec![x, vec![0.0; 20]], targets)
    }

    fn all_rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn one_split_recovers_a_step() {
        let (cols, y) = step_columns();
        let tree = RegressionTree::grow(&cols, &y, &all_rows(20), &limits(None, SplitMethod::Exact), 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&[3.0, 0.0]).unwrap(), 10.0);
        assert_eq!(tree.predict(&[15.0, 0.0]).unwrap(), 70.0);
        let shares = tree.sse_shares();
        assert!((shares[0] - 1.0).abs() < 1e-12);
        assert_eq!(shares[1], 0.0);
    }

    #[test]
    fn repeated_rows_weight_the_leaf_mean() {
        let cols = vec![vec![0.0, 0.0]];
        let y = vec![10.0, 40.0];
        // Row 0 drawn three times, row 1 once; the feature cannot split them.
        let tree = RegressionTree::grow(&cols, &y, &[0, 0, 0, 1], &limits(None, SplitMethod::Exact), 1);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.nodes()[0].n_samples(), 4);
        assert!((tree.predict(&[0.0]).unwrap() - 17.5).abs() < 1e-12);
        assert!(tree.sse_shares().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn depth_cap_is_respected() {
        let x: Vec<f64> = (0..64).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let cols = vec![x, vec![1.0; 64]];
        let tree = RegressionTree::grow(&cols, &y, &all_rows(64), &limits(Some(3), SplitMethod::Exact), 1);
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn random_thresholds_still_fit_training_rows() {
        let (cols, y) = step_columns();
        let tree = RegressionTree::grow(&cols, &y, &all_rows(20), &limits(None, SplitMethod::ExtraTrees), 11);
        for (i, target) in y.iter().enumerate() {
            let row = [cols[0][i], cols[1][i]];
            assert_eq!(tree.predict(&row).unwrap(), *target);
        }
    }

    #[test]
    fn prediction_width_checked() {
        let (cols, y) = step_columns();
        let tree = RegressionTree::grow(&cols, &y, &all_rows(20), &limits(None, SplitMethod::Exact), 1);
        assert!(matches!(
            tree.predict(&[1.0]),
            Err(crate::RfError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }
}
