//! Criterion benchmarks for canopy-rf: training and per-member prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use canopy_rf::{RandomForestConfig, predict_with_spread};

fn make_regression(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>()).collect();
        targets.push(100.0 * row[0] * row[1] + 10.0 * row[2]);
        features.push(row);
    }
    let names: Vec<String> = (0..n_features).map(|f| format!("f{f}")).collect();
    (features, targets, names)
}

fn bench_rf_train(c: &mut Criterion) {
    let (features, targets, names) = make_regression(500, 12, 42);
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("rf_train_500x12_50trees", |b| {
        b.iter(|| cfg.fit(&features, &targets, &names).unwrap());
    });
}

fn bench_rf_predict_spread(c: &mut Criterion) {
    let (features, targets, names) = make_regression(500, 12, 42);
    let forest = RandomForestConfig::new(50)
        .unwrap()
        .with_seed(42)
        .fit(&features, &targets, &names)
        .unwrap()
        .into_forest();

    c.bench_function("rf_predict_spread_500x12_50trees", |b| {
        b.iter(|| predict_with_spread(&forest, &features).unwrap());
    });
}

criterion_group!(benches, bench_rf_train, bench_rf_predict_spread);
criterion_main!(benches);
