//! CART classification tree grown on weighted Gini impurity.
//! Shared by the bagged forest and extra trees.

use crate::rng::StreamRng;
use ndarray::{ArrayView1, ArrayView2};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitStrategy {
    /// Best threshold over every distinct value.
    Best,
    /// One uniformly drawn threshold per candidate feature.
    Random,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub max_features:      usize,
    pub strategy:          SplitStrategy,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

/// Training view shared by every recursive call.
struct Grower<'a, 'x> {
    x:         ArrayView2<'x, f64>,
    y:         &'a [usize],
    weights:   &'a [f64],
    n_classes: usize,
    params:    &'a TreeParams,
}

#[derive(Debug, Clone)]
pub(crate) struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree over `rows`. Rows with zero weight are ignored.
    pub(crate) fn grow(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        weights: &[f64],
        rows: Vec<usize>,
        n_classes: usize,
        params: &TreeParams,
        rng: &mut StreamRng,
    ) -> Self {
        let grower = Grower { x, y, weights, n_classes, params };
        let mut tree = Self { nodes: Vec::new() };
        tree.build(&grower, rows, 0, rng);
        tree
    }

    /// Normalised class distribution of the leaf `row` lands in.
    pub(crate) fn distribution(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn build(&mut self, g: &Grower<'_, '_>, rows: Vec<usize>, depth: usize, rng: &mut StreamRng) -> usize {
        let counts = class_weights(g, &rows);
        let occupied = counts.iter().filter(|&&w| w > 0.0).count();
        let depth_reached = g.params.max_depth.is_some_and(|max| depth >= max);

        if occupied <= 1 || depth_reached || rows.len() < g.params.min_samples_split {
            return self.push_leaf(counts);
        }

        let Some((feature, threshold)) = find_split(g, &rows, &counts, rng) else {
            return self.push_leaf(counts);
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| g.x[[r, feature]] <= threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            let mut all = left_rows;
            all.extend(right_rows);
            return self.push_leaf(class_weights(g, &all));
        }

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { distribution: Vec::new() });
        let left = self.build(g, left_rows, depth + 1, rng);
        let right = self.build(g, right_rows, depth + 1, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    fn push_leaf(&mut self, mut counts: Vec<f64>) -> usize {
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        } else {
            let k = counts.len() as f64;
            counts.iter_mut().for_each(|c| *c = 1.0 / k);
        }
        self.nodes.push(Node::Leaf { distribution: counts });
        self.nodes.len() - 1
    }
}

fn class_weights(g: &Grower<'_, '_>, rows: &[usize]) -> Vec<f64> {
    let mut counts = vec![0.0; g.n_classes];
    for &r in rows {
        counts[g.y[r]] += g.weights[r];
    }
    counts
}

/// Weighted Gini impurity times total weight.
fn weighted_gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
    total - sum_sq / total
}

/// Considers `max_features` random features, drawing further ones only
/// while none of them has produced a split.
fn find_split(
    g: &Grower<'_, '_>,
    rows: &[usize],
    counts: &[f64],
    rng: &mut StreamRng,
) -> Option<(usize, f64)> {
    let parent = weighted_gini(counts);
    let features = rng.sample_indices(g.x.ncols(), g.x.ncols());

    let mut best: Option<(usize, f64, f64)> = None;
    for (visited, feature) in features.into_iter().enumerate() {
        if visited >= g.params.max_features && best.is_some() {
            break;
        }
        let candidate = match g.params.strategy {
            SplitStrategy::Best => best_threshold(g, rows, counts, feature),
            SplitStrategy::Random => random_threshold(g, rows, counts, feature, rng),
        };
        if let Some((threshold, impurity)) = candidate {
            let gain = parent - impurity;
            if gain > MIN_GAIN && best.is_none_or(|(_, _, g_best)| gain > g_best) {
                best = Some((feature, threshold, gain));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// Lowest child impurity over all midpoints between distinct values.
fn best_threshold(g: &Grower<'_, '_>, rows: &[usize], counts: &[f64], feature: usize) -> Option<(f64, f64)> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|&a, &b| g.x[[a, feature]].total_cmp(&g.x[[b, feature]]));

    let mut left = vec![0.0; g.n_classes];
    let mut right = counts.to_vec();
    let mut best: Option<(f64, f64)> = None;
    for pair in sorted.windows(2) {
        let (r, next) = (pair[0], pair[1]);
        left[g.y[r]] += g.weights[r];
        right[g.y[r]] -= g.weights[r];

        let (v, v_next) = (g.x[[r, feature]], g.x[[next, feature]]);
        if v_next <= v {
            continue;
        }
        let impurity = weighted_gini(&left) + weighted_gini(&right);
        if best.is_none_or(|(_, b)| impurity < b) {
            best = Some((v + (v_next - v) / 2.0, impurity));
        }
    }
    best
}

fn random_threshold(
    g: &Grower<'_, '_>,
    rows: &[usize],
    counts: &[f64],
    feature: usize,
    rng: &mut StreamRng,
) -> Option<(f64, f64)> {
    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
        let v = g.x[[r, feature]];
        (lo.min(v), hi.max(v))
    });
    if hi <= lo {
        return None;
    }
    // uniform draw can land on hi; keep it strictly below so both sides fill
    let threshold = rng.uniform(lo, hi).min(hi - (hi - lo) * 1e-9);

    let mut left = vec![0.0; g.n_classes];
    for &r in rows.iter().filter(|&&r| g.x[[r, feature]] <= threshold) {
        left[g.y[r]] += g.weights[r];
    }
    let right: Vec<f64> = counts.iter().zip(&left).map(|(c, l)| c - l).collect();
    Some((threshold, weighted_gini(&left) + weighted_gini(&right)))
}
