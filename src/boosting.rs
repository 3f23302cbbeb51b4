//! Multi-class gradient boosting over regression trees with a softmax link.
//!
//! Every round fits one tree per class against the gradients taken at the start of the
//! round. Two objectives share the machinery:
//! - [`BoostingObjective::SecondOrder`]: gradient/hessian splits with L2-regularised leaves.
//! - [`BoostingObjective::Friedman`]: residual splits scored by Friedman's improvement with a
//!   Newton step per leaf, initialised from the class log-priors.

use serde::{Deserialize, Serialize};

use crate::tree::{FriedmanMse, GrowParams, SecondOrder, Tree, grow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostingObjective {
    SecondOrder,
    Friedman,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub objective: BoostingObjective,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub min_samples_leaf: usize,
}

impl BoostingParams {
    pub fn gradient_boosted_trees() -> Self {
        Self {
            objective: BoostingObjective::SecondOrder,
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            lambda: 1.0,
            min_child_weight: 1.0,
            min_samples_leaf: 1,
        }
    }

    pub fn gradient_boosting() -> Self {
        Self {
            objective: BoostingObjective::Friedman,
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            lambda: 0.0,
            min_child_weight: 0.0,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    params: BoostingParams,
    n_classes: usize,
    init: Vec<f64>,
    /// One tree per class for every boosting round.
    rounds: Vec<Vec<Tree<f64>>>,
}

impl BoostedTrees {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        params: BoostingParams,
    ) -> Self {
        let n = x.len();
        let init = initial_scores(y, n_classes, params.objective);
        let mut scores = vec![init.clone(); n];
        let mut rounds = Vec::with_capacity(params.n_estimators);

        if n_classes < 2 || n == 0 {
            return Self {
                params,
                n_classes,
                init,
                rounds,
            };
        }

        let samples: Vec<usize> = (0..n).collect();
        let grow_params = GrowParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
        };
        let scale = (n_classes as f64 - 1.0) / n_classes as f64;

        for _ in 0..params.n_estimators {
            let probs: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let mut trees = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let target = |i: usize| if y[i] == k { 1.0 } else { 0.0 };
                let tree = match params.objective {
                    BoostingObjective::SecondOrder => {
                        let grad: Vec<f64> = (0..n).map(|i| probs[i][k] - target(i)).collect();
                        let hess: Vec<f64> = (0..n)
                            .map(|i| (2.0 * probs[i][k] * (1.0 - probs[i][k])).max(1e-16))
                            .collect();
                        let criterion = SecondOrder {
                            grad: &grad,
                            hess: &hess,
                            lambda: params.lambda,
                            min_child_weight: params.min_child_weight,
                        };
                        grow(x, &samples, n_features, &criterion, grow_params)
                    }
                    BoostingObjective::Friedman => {
                        let residuals: Vec<f64> =
                            (0..n).map(|i| target(i) - probs[i][k]).collect();
                        let denominators: Vec<f64> = residuals
                            .iter()
                            .map(|r| r.abs() * (1.0 - r.abs()))
                            .collect();
                        let criterion = FriedmanMse {
                            residuals: &residuals,
                            denominators: &denominators,
                            scale,
                            min_samples_leaf: params.min_samples_leaf,
                        };
                        grow(x, &samples, n_features, &criterion, grow_params)
                    }
                };
                trees.push(tree);
            }

            for (row, score) in x.iter().zip(scores.iter_mut()) {
                for (k, tree) in trees.iter().enumerate() {
                    score[k] += params.learning_rate * tree.leaf(row);
                }
            }
            rounds.push(trees);
        }

        Self {
            params,
            n_classes,
            init,
            rounds,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut score = self.init.clone();
        for trees in &self.rounds {
            for (k, tree) in trees.iter().enumerate() {
                score[k] += self.params.learning_rate * tree.leaf(row);
            }
        }
        softmax(&score)
    }

    pub(crate) fn is_well_formed(&self, n_features: usize) -> bool {
        self.init.len() == self.n_classes
            && self.rounds.iter().all(|trees| {
                trees.len() == self.n_classes && trees.iter().all(|t| t.is_well_formed(n_features))
            })
    }
}

fn initial_scores(y: &[usize], n_classes: usize, objective: BoostingObjective) -> Vec<f64> {
    match objective {
        BoostingObjective::SecondOrder => vec![0.0; n_classes],
        BoostingObjective::Friedman => {
            let mut counts = vec![0usize; n_classes];
            for &label in y {
                if label < n_classes {
                    counts[label] += 1;
                }
            }
            let n = y.len().max(1) as f64;
            counts
                .iter()
                .map(|&c| ((c as f64).max(1e-3) / n).ln())
                .collect()
        }
    }
}

pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let mx = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - mx).exp()).collect();
    let den: f64 = exps.iter().sum::<f64>().max(1e-300);
    exps.iter().map(|e| e / den).collect()
}
