//! Random forest built from smartcore CART classifiers.
//!
//! Each member is fitted on a bootstrap sample restricted to its own random subset of
//! the feature columns; the forest probability for a class is the share of member votes.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};

use crate::error::{PredictorError, Result};

type Cart = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Vote {
    /// The bootstrap sample held a single class.
    Constant { class: usize },
    Tree { tree: Cart },
}

impl PartialEq for Vote {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Vote::Constant { class: a }, Vote::Constant { class: b }) => a == b,
            // Fitted smartcore trees only expose their nodes through serde.
            (Vote::Tree { tree: a }, Vote::Tree { tree: b }) => {
                match (serde_json::to_value(a), serde_json::to_value(b)) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Member {
    /// Sorted feature columns this member was fitted on.
    features: Vec<usize>,
    vote: Vote,
}

impl Member {
    fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        labels: &[u32],
        n_features: usize,
        subspace: usize,
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = x.len();
        let mut features = index::sample(&mut rng, n_features, subspace).into_vec();
        features.sort_unstable();
        let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let first = y[bootstrap[0]];
        if bootstrap.iter().all(|&i| y[i] == first) {
            return Ok(Self {
                features,
                vote: Vote::Constant { class: first },
            });
        }

        let rows: Vec<Vec<f64>> = bootstrap
            .iter()
            .map(|&i| project(&x[i], &features))
            .collect();
        let sample_labels: Vec<u32> = bootstrap.iter().map(|&i| labels[i]).collect();
        let matrix = DenseMatrix::from_2d_vec(&rows).map_err(estimator_error)?;
        let tree_params = DecisionTreeClassifierParameters {
            seed: Some(seed),
            ..DecisionTreeClassifierParameters::default()
                .with_max_depth(params.max_depth)
                .with_min_samples_split(params.min_samples_split)
                .with_min_samples_leaf(params.min_samples_leaf)
        };
        let tree = Cart::fit(&matrix, &sample_labels, tree_params).map_err(estimator_error)?;
        Ok(Self {
            features,
            vote: Vote::Tree { tree },
        })
    }

    fn vote(&self, row: &[f64]) -> Result<usize> {
        let tree = match &self.vote {
            Vote::Constant { class } => return Ok(*class),
            Vote::Tree { tree } => tree,
        };
        let input = DenseMatrix::from_2d_vec(&vec![project(row, &self.features)])
            .map_err(estimator_error)?;
        let predicted = tree.predict(&input).map_err(estimator_error)?;
        let label = predicted.first().copied().ok_or_else(|| PredictorError::Estimator {
            reason: "tree returned no prediction".to_string(),
        })?;
        usize::try_from(label).map_err(|_| PredictorError::Estimator {
            reason: format!("class label {label} does not fit usize"),
        })
    }
}

fn project(row: &[f64], features: &[usize]) -> Vec<f64> {
    features
        .iter()
        .map(|&j| row.get(j).copied().unwrap_or(0.0))
        .collect()
}

fn estimator_error(err: Failed) -> PredictorError {
    PredictorError::Estimator {
        reason: err.to_string(),
    }
}

/// Columns sampled per member: `ceil(sqrt(n_features))`.
fn subspace_size(n_features: usize) -> usize {
    ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features.max(1))
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_classes: usize,
    members: Vec<Member>,
}

impl RandomForest {
    /// Members are fitted in parallel, each from its own seed drawn from `seed`, so the
    /// result does not depend on thread scheduling.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        params: ForestParams,
        seed: u64,
    ) -> Result<Self> {
        let n = x.len();
        if n == 0 || n_classes == 0 || n_features == 0 {
            return Ok(Self {
                params,
                n_classes,
                members: Vec::new(),
            });
        }

        let labels: Vec<u32> = y
            .iter()
            .map(|&class| u32::try_from(class))
            .collect::<Result<_, _>>()
            .map_err(|_| PredictorError::Estimator {
                reason: "class index does not fit a u32 label".to_string(),
            })?;

        let mut seeder = StdRng::seed_from_u64(seed);
        let member_seeds: Vec<u64> = (0..params.n_estimators)
            .map(|_| seeder.next_u64())
            .collect();
        let subspace = subspace_size(n_features);

        let members = member_seeds
            .par_iter()
            .map(|&member_seed| {
                Member::fit(x, y, &labels, n_features, subspace, &params, member_seed)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            params,
            n_classes,
            members,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Share of member votes per class.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if self.members.is_empty() {
            return Ok(vec![1.0 / self.n_classes.max(1) as f64; self.n_classes]);
        }
        let mut out = vec![0.0; self.n_classes];
        for member in &self.members {
            let class = member.vote(row)?;
            let slot = out.get_mut(class).ok_or_else(|| PredictorError::Estimator {
                reason: format!("vote for class {class} outside {} classes", self.n_classes),
            })?;
            *slot += 1.0;
        }
        let n = self.members.len() as f64;
        out.iter_mut().for_each(|p| *p /= n);
        Ok(out)
    }

    pub(crate) fn is_well_formed(&self, n_features: usize) -> bool {
        self.members.iter().all(|m| {
            !m.features.is_empty()
                && m.features.windows(2).all(|w| w[0] < w[1])
                && m.features.iter().all(|&j| j < n_features)
                && match m.vote {
                    Vote::Constant { class } => class < self.n_classes,
                    Vote::Tree { .. } => true,
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            let class = i % 3;
            let centre = class as f64 * 10.0;
            x.push(vec![centre + (i % 5) as f64 * 0.1, -centre, (i % 7) as f64]);
            y.push(class);
        }
        (x, y)
    }

    #[test]
    fn forest_probabilities_form_a_distribution() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, 3, ForestParams::default(), 42).unwrap();
        assert_eq!(forest.n_trees(), 100);
        assert!(forest.is_well_formed(3));
        let p = forest.predict_proba(&[20.1, -20.0, 3.0]).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p[2] > 0.5, "{p:?}");
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = blobs();
        let a = RandomForest::fit(&x, &y, 3, 3, ForestParams::default(), 7).unwrap();
        let b = RandomForest::fit(&x, &y, 3, 3, ForestParams::default(), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_bootstraps_vote_constant() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let y = vec![1; 10];
        let forest = RandomForest::fit(&x, &y, 2, 2, ForestParams::default(), 3).unwrap();
        assert_eq!(forest.predict_proba(&[4.0, 1.0]).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn subspace_is_root_of_feature_count() {
        assert_eq!(subspace_size(11), 4);
        assert_eq!(subspace_size(9), 3);
        assert_eq!(subspace_size(1), 1);
    }

    #[test]
    fn forest_survives_json_round_trip() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, 3, 3, ForestParams::default(), 11).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, forest);
        let row = [0.2, 0.0, 4.0];
        assert_eq!(restored.predict_proba(&row).unwrap(), forest.predict_proba(&row).unwrap());
    }
}
