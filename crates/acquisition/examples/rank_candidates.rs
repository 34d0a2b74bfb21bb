use env_logger::{Builder, Env};
use fitrank_acq::{rank, AcquisitionConfig, RankInput, Strategy};
use fitrank_gp::{GaussianProcess, KernelSpec, PredictOptions};
use linfa::prelude::*;
use ndarray::{Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

/// Fitness landscape with its maximum at (0.3, ..., 0.3)
fn fitness(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| -row.mapv(|v| (v - 0.3) * (v - 0.3)).sum())
}

fn main() {
    let env = Env::new().filter_or("FITRANK_LOG", "info");
    Builder::from_env(env).try_init().ok();

    let mut rng = Xoshiro256Plus::seed_from_u64(0);
    let train_features = Array::random_using((30, 4), Uniform::new(0., 1.), &mut rng);
    let targets = fitness(&train_features);
    let candidates = Array::random_using((8, 4), Uniform::new(0., 1.), &mut rng);

    let gp = GaussianProcess::params(vec![KernelSpec::gaussian()])
        .optimize_hyperparameters(true)
        .scale_data(true)
        .fit(&Dataset::new(train_features.clone(), targets.clone()))
        .expect("GP fitting");
    let pred = gp
        .predict_with(&candidates, &PredictOptions::default().uncertainty(true))
        .expect("GP prediction");
    let uncertainty = pred.uncertainty.expect("uncertainty");

    let input = RankInput {
        targets: targets.view(),
        predictions: pred.prediction.view(),
        uncertainty: uncertainty.view(),
        train_features: train_features.view(),
        test_features: candidates.view(),
    };
    let scores = rank(&input, &Strategy::NAMES, &AcquisitionConfig::default()).expect("ranking");
    for (name, values) in scores.iter() {
        let best = (0..values.len()).fold(0, |a, i| if values[i] > values[a] { i } else { a });
        println!("{name:>10}: best candidate #{best}, scores {values:.4}");
    }
}
