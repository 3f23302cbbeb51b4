use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use ev_predictor::features::build_training_rows;
use ev_predictor::model::Algorithm;
use ev_predictor::{OddsQuote, TrainConfig, best_outcome, predict, train};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{strong_home_features, synthetic_history};

fn bench_feature_rows(c: &mut Criterion) {
    let history = synthetic_history("Premier League", 400, 1);
    c.bench_function("build_training_rows_400", |b| {
        b.iter(|| {
            let rows = build_training_rows(black_box(&history));
            black_box(rows.len());
        })
    });
}

fn bench_train(c: &mut Criterion) {
    let history = synthetic_history("Premier League", 200, 2);
    let mut group = c.benchmark_group("train_200");
    group.sample_size(10);
    for algorithm in [
        Algorithm::GradientBoostedTrees,
        Algorithm::RandomForest,
        Algorithm::GradientBoosting,
    ] {
        let config = TrainConfig::default().with_algorithm(algorithm);
        group.bench_function(algorithm.as_str(), |b| {
            b.iter(|| {
                let model = train("Premier League", black_box(&history), &config).unwrap();
                black_box(model.metrics.accuracy);
            })
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let history = synthetic_history("Premier League", 200, 3);
    let features = strong_home_features();
    let odds = OddsQuote::from_1x2(1.7, 3.9, 5.0).unwrap();
    for algorithm in [Algorithm::GradientBoostedTrees, Algorithm::RandomForest] {
        let model = train(
            "Premier League",
            &history,
            &TrainConfig::default().with_algorithm(algorithm),
        )
        .unwrap();
        c.bench_function(&format!("predict_{algorithm}"), |b| {
            b.iter(|| {
                let result = predict(&model, black_box(&features), Some(&odds)).unwrap();
                black_box(best_outcome(&result).map(|(o, _)| o));
            })
        });
    }
}

criterion_group!(perf, bench_feature_rows, bench_train, bench_predict);
criterion_main!(perf);
