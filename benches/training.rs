use credit_scope::optimizer::{GridSearchCV, GridSearchConfig};
use credit_scope::rules::{SkopeRules, SkopeRulesConfig};
use credit_scope::training::{ClassWeight, MaxFeatures, RandomForest};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // About a fifth of the rows default, driven by the first two features
    let y = Array1::from_iter(x.rows().into_iter().map(|row| {
        let noise = rng.gen::<f64>();
        if row[0] + row[1] + noise * 4.0 > 15.0 { 1.0 } else { 0.0 }
    }));

    (x, y)
}

fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);

    for n_rows in [1000, 5000, 15000].iter() {
        let (x, y) = create_classification_data(*n_rows, 17);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut forest = RandomForest::new_classifier(30)
                    .with_max_depth(5)
                    .with_max_features(MaxFeatures::Fraction(0.55))
                    .with_class_weight(ClassWeight::Balanced)
                    .with_random_state(0);
                forest.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = create_classification_data(2000, 17);
    let config = GridSearchConfig::new()
        .with_max_depth_grid(vec![3, 5])
        .with_max_features_grid(vec![0.1, 1.0]);

    group.bench_function("2x2_grid_5_folds", |b| {
        b.iter(|| {
            let mut search = GridSearchCV::new(config.clone());
            search.fit(black_box(&x), black_box(&y)).unwrap();
        })
    });

    group.finish();
}

fn bench_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("rules");
    group.sample_size(10);

    let (x, y) = create_classification_data(5000, 17);

    group.bench_function("skope_fit", |b| {
        b.iter(|| {
            let mut skope = SkopeRules::new(SkopeRulesConfig::credit_default().with_random_state(0));
            skope.fit(black_box(&x), black_box(&y), None).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_forest_fit, bench_grid_search, bench_rules);
criterion_main!(benches);
