//! Squared-error split search.

use rand::Rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::node::FeatureIndex;

/// How thresholds are chosen at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Midpoints between consecutive distinct values, all of them tried.
    Exact,
    /// One uniform draw between the node's min and max per column.
    ExtraTrees,
}

/// Count, sum and sum of squares of a set of targets.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TargetStats {
    pub(crate) n: usize,
    sum: f64,
    sum_sq: f64,
}

impl TargetStats {
    pub(crate) fn from_indices(targets: &[f64], rows: &[usize]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, &r| {
            acc.push(targets[r]);
            acc
        })
    }

    pub(crate) fn push(&mut self, y: f64) {
        self.n += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    fn pop(&mut self, y: f64) {
        self.n -= 1;
        self.sum -= y;
        self.sum_sq -= y * y;
    }

    pub(crate) fn mean(&self) -> f64 {
        match self.n {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }

    /// Summed squared deviation from the mean; rounding never makes it negative.
    pub(crate) fn sse(&self) -> f64 {
        match self.n {
            0 => 0.0,
            n => (self.sum_sq - self.sum * self.sum / n as f64).max(0.0),
        }
    }

    #[cfg(test)]
    fn variance(&self) -> f64 {
        match self.n {
            0 => 0.0,
            n => self.sse() / n as f64,
        }
    }
}

/// The chosen split of a node's rows.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// Parent SSE minus the children's summed SSE.
    pub(crate) sse_reduction: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Best split of `rows` over `max_features` randomly chosen columns.
///
/// `columns[c][r]` is column `c` of row `r`. `None` when every candidate
/// column is constant here or every boundary leaves a side smaller than
/// `min_leaf`.
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    method: SplitMethod,
    max_features: usize,
    min_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    if rows.len() < 2 || columns.is_empty() {
        return None;
    }
    let parent = TargetStats::from_indices(targets, rows);
    let candidates = sample(rng, columns.len(), max_features.min(columns.len())).into_vec();

    let mut best: Option<(usize, f64, f64)> = None;
    for c in candidates {
        let found = match method {
            SplitMethod::Exact => best_boundary(&columns[c], targets, rows, parent, min_leaf),
            SplitMethod::ExtraTrees => random_boundary(&columns[c], targets, rows, min_leaf, rng),
        };
        if let Some((threshold, child_sse)) = found
            && best.is_none_or(|(_, _, sse)| child_sse < sse)
        {
            best = Some((c, threshold, child_sse));
        }
    }

    let (c, threshold, child_sse) = best?;
    let (left_indices, right_indices) = rows.iter().partition(|&&r| columns[c][r] <= threshold);
    Some(SplitResult {
        feature: FeatureIndex::new(c),
        threshold,
        sse_reduction: (parent.sse() - child_sse).max(0.0),
        left_indices,
        right_indices,
    })
}

/// Sweep the sorted column once, moving rows from right to left.
///
/// Returns the midpoint threshold with the lowest summed child SSE.
fn best_boundary(
    column: &[f64],
    targets: &[f64],
    rows: &[usize],
    parent: TargetStats,
    min_leaf: usize,
) -> Option<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = rows.iter().map(|&r| (column[r], targets[r])).collect();
    pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut left = TargetStats::default();
    let mut right = parent;
    let mut best: Option<(f64, f64)> = None;
    for step in pairs.windows(2) {
        let ((x, y), (x_next, _)) = (step[0], step[1]);
        left.push(y);
        right.pop(y);
        if x == x_next || left.n < min_leaf || right.n < min_leaf {
            continue;
        }
        let child_sse = left.sse() + right.sse();
        if best.is_none_or(|(_, sse)| child_sse < sse) {
            best = Some((0.5 * (x + x_next), child_sse));
        }
    }
    best
}

/// One threshold drawn uniformly in `[min, max)` of the column at this node.
fn random_boundary(
    column: &[f64],
    targets: &[f64],
    rows: &[usize],
    min_leaf: usize,
    rng: &mut impl Rng,
) -> Option<(f64, f64)> {
    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
        (lo.min(column[r]), hi.max(column[r]))
    });
    if lo >= hi {
        return None;
    }
    let threshold = rng.gen_range(lo..hi);

    let (mut left, mut right) = (TargetStats::default(), TargetStats::default());
    for &r in rows {
        let side = if column[r] <= threshold { &mut left } else { &mut right };
        side.push(targets[r]);
    }
    (left.n >= min_leaf && right.n >= min_leaf).then(|| (threshold, left.sse() + right.sse()))
}
