mod common;

use ev_predictor::features::{MatchStatus, build_training_rows, default_feature_names};
use ev_predictor::model::{Algorithm, Classifier};
use ev_predictor::outcome::Outcome;
use ev_predictor::predict::ConfidenceTier;
use ev_predictor::scaler::StandardScaler;
use ev_predictor::train::split_indices;
use ev_predictor::{FeatureVector, OddsQuote, PredictorError, TrainConfig, best_outcome, predict, train};

use common::{strong_home_features, synthetic_history};

const ALGORITHMS: [Algorithm; 3] = [
    Algorithm::GradientBoostedTrees,
    Algorithm::RandomForest,
    Algorithm::GradientBoosting,
];

#[test]
fn one_below_minimum_is_insufficient() {
    let history = synthetic_history("Premier League", 49, 1);
    let err = train("Premier League", &history, &TrainConfig::default()).unwrap_err();
    match err {
        PredictorError::InsufficientData {
            available,
            required,
        } => {
            assert_eq!(available, 49);
            assert_eq!(required, 50);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn exactly_minimum_trains() {
    let history = synthetic_history("Premier League", 50, 1);
    let model = train("Premier League", &history, &TrainConfig::default()).expect("trains");
    assert_eq!(model.metrics.train_samples, 40);
    assert_eq!(model.metrics.test_samples, 10);
    assert!(model.validate().is_ok());
    assert!(!model.is_fallback());
}

#[test]
fn unfinished_matches_do_not_count_towards_minimum() {
    let mut history = synthetic_history("Premier League", 50, 2);
    history[10].status = MatchStatus::Postponed;
    history[11].home_score = None;
    let err = train("Premier League", &history, &TrainConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PredictorError::InsufficientData { available: 48, .. }
    ));
}

#[test]
fn retraining_is_idempotent_for_every_algorithm() {
    let history = synthetic_history("La Liga", 120, 3);
    let features = strong_home_features();
    for algorithm in ALGORITHMS {
        let config = TrainConfig::default().with_algorithm(algorithm);
        let first = train("La Liga", &history, &config).expect("first fit");
        let second = train("La Liga", &history, &config).expect("second fit");

        assert_eq!(first.metrics, second.metrics, "{algorithm}");
        assert_eq!(first.scaler, second.scaler, "{algorithm}");
        assert_eq!(first.classifier, second.classifier, "{algorithm}");
        assert_eq!(
            predict(&first, &features, None).unwrap(),
            predict(&second, &features, None).unwrap(),
            "{algorithm}"
        );
    }
}

#[test]
fn classifier_kind_follows_algorithm() {
    let history = synthetic_history("Serie A", 80, 4);
    for algorithm in ALGORITHMS {
        let model = train("Serie A", &history, &TrainConfig::default().with_algorithm(algorithm))
            .expect("trains");
        assert_eq!(model.key.algorithm, algorithm);
        match (&model.classifier, algorithm) {
            (Classifier::Forest(_), Algorithm::RandomForest) => {}
            (Classifier::Boosted(_), Algorithm::GradientBoostedTrees | Algorithm::GradientBoosting) => {}
            (other, _) => panic!("{algorithm} produced {other:?}"),
        }
    }
}

#[test]
fn probabilities_stay_in_unit_interval() {
    let history = synthetic_history("Bundesliga", 150, 5);
    let odds = OddsQuote::from_1x2(1.6, 4.0, 5.5).unwrap();
    for algorithm in ALGORITHMS {
        let model = train("Bundesliga", &history, &TrainConfig::default().with_algorithm(algorithm))
            .expect("trains");
        let result = predict(&model, &strong_home_features(), Some(&odds)).unwrap();
        assert_eq!(result.len(), model.classes.len());

        let mut sum = 0.0;
        for (outcome, p) in result.iter() {
            assert!((0.0..=1.0).contains(&p.probability), "{algorithm} {outcome}");
            assert_eq!(p.confidence, ConfidenceTier::from_probability(p.probability));
            let ev = p.expected_value.expect("odds quoted for every outcome");
            let price = odds.get(outcome).unwrap();
            assert!((ev - (p.probability * (price - 1.0) - (1.0 - p.probability))).abs() < 1e-12);
            sum += p.probability;
        }
        assert!((sum - 1.0).abs() < 1e-6, "{algorithm}: {sum}");
    }
}

#[test]
fn dominant_home_side_is_the_pick() {
    let history = synthetic_history("Premier League", 200, 6);
    let model = train("Premier League", &history, &TrainConfig::default()).expect("trains");
    let result = predict(&model, &strong_home_features(), None).unwrap();
    let (pick, _) = best_outcome(&result).expect("non-empty");
    assert_eq!(pick, Outcome::Home);
}

#[test]
fn missing_features_default_to_zero() {
    let history = synthetic_history("Ligue 1", 60, 7);
    let model = train("Ligue 1", &history, &TrainConfig::default()).expect("trains");

    let sparse = FeatureVector::new().with("home_xg", 1.5);
    let mut padded = sparse.clone();
    for name in &model.feature_names {
        if sparse.get(name).is_none() {
            padded.insert(name, 0.0);
        }
    }
    padded.insert("weather_index", 9.0);

    assert_eq!(
        predict(&model, &sparse, None).unwrap(),
        predict(&model, &padded, None).unwrap()
    );
}

#[test]
fn empty_feature_vector_is_rejected() {
    let history = synthetic_history("Ligue 1", 60, 7);
    let model = train("Ligue 1", &history, &TrainConfig::default()).expect("trains");
    let err = predict(&model, &FeatureVector::new(), None).unwrap_err();
    assert!(matches!(err, PredictorError::FeatureMismatch { .. }));
}

#[test]
fn lower_minimum_allows_small_leagues() {
    let history = synthetic_history("Eredivisie", 12, 8);
    let config = TrainConfig::default().with_minimum_samples(10);
    let model = train("Eredivisie", &history, &config).expect("trains");
    assert_eq!(model.metrics.train_samples + model.metrics.test_samples, 12);
}

#[test]
fn scaler_is_fitted_on_the_training_split_only() {
    let history = synthetic_history("Eredivisie", 90, 7);
    let config = TrainConfig::default().with_seed(11);
    let model = train("Eredivisie", &history, &config).expect("trains");

    let names = default_feature_names();
    let rows: Vec<Vec<f64>> = build_training_rows(&history)
        .iter()
        .map(|r| r.features.to_row(&names))
        .collect();
    let (train_idx, test_idx) = split_indices(rows.len(), config.test_fraction, config.seed);
    assert_eq!(model.metrics.test_samples, test_idx.len());

    let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
    assert_eq!(model.scaler, StandardScaler::fit(&train_rows, names.len()));
    assert_ne!(model.scaler, StandardScaler::fit(&rows, names.len()));
}
