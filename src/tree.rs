//! Binary decision trees stored as a flat node arena.
//!
//! Trees are grown greedily by a [`Criterion`] that accumulates per-sample statistics,
//! scores candidate splits and turns the samples reaching a node into a leaf value.
//! Samples go left when `x[feature] <= threshold`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<L> {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(L),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<L> {
    nodes: Vec<Node<L>>,
}

impl<L> Tree<L> {
    pub fn leaf(&self, row: &[f64]) -> &L {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    /// Checks that child links point forward inside the arena and features fit `n_features`.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.nodes.iter().enumerate().all(|(idx, node)| match node {
            Node::Leaf(_) => true,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                *feature < n_features
                    && threshold.is_finite()
                    && *left > idx
                    && *right > idx
                    && *left < self.nodes.len()
                    && *right < self.nodes.len()
            }
        })
    }
}

/// Split scoring and leaf construction for one tree-growing objective.
pub(crate) trait Criterion {
    type Stats: Clone;
    type Leaf;

    fn empty(&self) -> Self::Stats;
    fn add(&self, stats: &mut Self::Stats, sample: usize);
    fn remove(&self, stats: &mut Self::Stats, sample: usize);
    /// Gain of the split, or `None` when a child violates the minimum-size constraint.
    fn gain(&self, parent: &Self::Stats, left: &Self::Stats, right: &Self::Stats) -> Option<f64>;
    fn leaf(&self, stats: &Self::Stats) -> Self::Leaf;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
}

pub(crate) fn grow<C: Criterion>(
    x: &[Vec<f64>],
    samples: &[usize],
    n_features: usize,
    criterion: &C,
    params: GrowParams,
) -> Tree<C::Leaf> {
    let mut builder = Builder {
        x,
        n_features,
        criterion,
        params,
        nodes: Vec::new(),
    };
    builder.build(samples, 0);
    Tree {
        nodes: builder.nodes,
    }
}

struct Builder<'a, C: Criterion> {
    x: &'a [Vec<f64>],
    n_features: usize,
    criterion: &'a C,
    params: GrowParams,
    nodes: Vec<Node<C::Leaf>>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<C: Criterion> Builder<'_, C> {
    fn build(&mut self, samples: &[usize], depth: usize) -> usize {
        let mut stats = self.criterion.empty();
        for &s in samples {
            self.criterion.add(&mut stats, s);
        }

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(self.criterion.leaf(&stats)));

        if depth >= self.params.max_depth || samples.len() < self.params.min_samples_split.max(2) {
            return idx;
        }
        let Some(split) = self.best_split(samples, &stats) else {
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&s| self.value(s, split.feature) <= split.threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            return idx;
        }

        let left = self.build(&left_samples, depth + 1);
        let right = self.build(&right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, samples: &[usize], parent: &C::Stats) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;

        for feature in 0..self.n_features {
            let mut order = samples.to_vec();
            order.sort_by(|&a, &b| {
                self.value(a, feature)
                    .partial_cmp(&self.value(b, feature))
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });

            let mut left = self.criterion.empty();
            let mut right = parent.clone();
            for pos in 0..order.len() - 1 {
                let s = order[pos];
                self.criterion.add(&mut left, s);
                self.criterion.remove(&mut right, s);

                let here = self.value(s, feature);
                let next = self.value(order[pos + 1], feature);
                if next <= here {
                    continue;
                }
                let Some(gain) = self.criterion.gain(parent, &left, &right) else {
                    continue;
                };
                if gain <= MIN_GAIN {
                    continue;
                }
                if best.as_ref().is_none_or(|b| gain > b.gain + MIN_GAIN) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn value(&self, sample: usize, feature: usize) -> f64 {
        self.x[sample].get(feature).copied().unwrap_or(0.0)
    }
}

/// Second-order (gradient/hessian) objective with L2 leaf regularisation.
pub(crate) struct SecondOrder<'a> {
    pub grad: &'a [f64],
    pub hess: &'a [f64],
    pub lambda: f64,
    pub min_child_weight: f64,
}

impl Criterion for SecondOrder<'_> {
    type Stats = (f64, f64);
    type Leaf = f64;

    fn empty(&self) -> Self::Stats {
        (0.0, 0.0)
    }

    fn add(&self, stats: &mut Self::Stats, sample: usize) {
        stats.0 += self.grad[sample];
        stats.1 += self.hess[sample];
    }

    fn remove(&self, stats: &mut Self::Stats, sample: usize) {
        stats.0 -= self.grad[sample];
        stats.1 -= self.hess[sample];
    }

    fn gain(&self, parent: &Self::Stats, left: &Self::Stats, right: &Self::Stats) -> Option<f64> {
        if left.1 < self.min_child_weight || right.1 < self.min_child_weight {
            return None;
        }
        let score = |(g, h): &(f64, f64)| g * g / (h + self.lambda);
        Some(0.5 * (score(left) + score(right) - score(parent)))
    }

    fn leaf(&self, stats: &Self::Stats) -> f64 {
        -stats.0 / (stats.1 + self.lambda)
    }
}

/// Least-squares fit of residuals scored by Friedman's improvement, with a Newton step
/// per leaf: `scale * sum(r) / sum(denominator)`.
pub(crate) struct FriedmanMse<'a> {
    pub residuals: &'a [f64],
    pub denominators: &'a [f64],
    pub scale: f64,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResidualStats {
    n: usize,
    sum: f64,
    den: f64,
}

impl Criterion for FriedmanMse<'_> {
    type Stats = ResidualStats;
    type Leaf = f64;

    fn empty(&self) -> Self::Stats {
        ResidualStats::default()
    }

    fn add(&self, stats: &mut Self::Stats, sample: usize) {
        stats.n += 1;
        stats.sum += self.residuals[sample];
        stats.den += self.denominators[sample];
    }

    fn remove(&self, stats: &mut Self::Stats, sample: usize) {
        stats.n -= 1;
        stats.sum -= self.residuals[sample];
        stats.den -= self.denominators[sample];
    }

    fn gain(&self, _parent: &Self::Stats, left: &Self::Stats, right: &Self::Stats) -> Option<f64> {
        let min = self.min_samples_leaf.max(1);
        if left.n < min || right.n < min {
            return None;
        }
        let (nl, nr) = (left.n as f64, right.n as f64);
        let diff = left.sum / nl - right.sum / nr;
        Some(nl * nr * diff * diff / (nl + nr))
    }

    fn leaf(&self, stats: &Self::Stats) -> f64 {
        if stats.den.abs() < 1e-150 {
            0.0
        } else {
            self.scale * stats.sum / stats.den
        }
    }
}
