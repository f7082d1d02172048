use serde::{Deserialize, Serialize};

/// Column of the predictor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Column position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Position of a node in its tree's arena; the root is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) const ROOT: Self = Self(0);

    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Rows with `x[feature] <= threshold` descend left.
    Split {
        feature: FeatureIndex,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        /// Bootstrap rows that reached the node.
        n_samples: usize,
        /// Drop in summed squared error achieved by the split.
        sse_reduction: f64,
    },
    /// Predicts the mean canopy cover of its rows.
    Leaf { value: f64, n_samples: usize },
}

impl Node {
    /// Bootstrap rows that reached the node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Node, NodeIndex};

    #[test]
    fn node_accessors() {
        let leaf = Node::Leaf {
            value: 42.5,
            n_samples: 10,
        };
        let split = Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 3.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            n_samples: 20,
            sse_reduction: 80.0,
        };
        assert!(leaf.is_leaf());
        assert!(!split.is_leaf());
        assert_eq!(leaf.n_samples() + split.n_samples(), 30);
        assert_eq!(NodeIndex::ROOT.index(), 0);
    }
}
