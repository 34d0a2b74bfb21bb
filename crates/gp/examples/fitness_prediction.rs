use env_logger::{Builder, Env};
use fitrank_gp::basis::LinearBasis;
use fitrank_gp::metrics::PredictScore;
use fitrank_gp::{GaussianProcess, KernelSpec, PredictOptions};
use linfa::prelude::*;
use ndarray::{concatenate, Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

/// Fitness of fingerprints: linear trend plus a bump
fn fitness(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| {
        let trend = row.sum();
        let bump = (-row.mapv(|v| (v - 0.5) * (v - 0.5)).sum() * 4.).exp();
        trend + 2. * bump
    })
}

fn main() {
    let env = Env::new().filter_or("FITRANK_LOG", "info");
    Builder::from_env(env).try_init().ok();

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = Array::random_using((40, 3), Uniform::new(0., 1.), &mut rng);
    let yt = fitness(&xt);
    let xtest = Array::random_using((10, 3), Uniform::new(0., 1.), &mut rng);
    let ytest = fitness(&xtest);

    let gp = GaussianProcess::params(vec![KernelSpec::gaussian(), KernelSpec::linear()])
        .optimize_hyperparameters(true)
        .scale_data(true)
        .fit(&Dataset::new(xt, yt))
        .expect("GP fitting");
    println!("Fitted {gp}");

    let basis = LinearBasis();
    let pred = gp
        .predict_with(
            &xtest,
            &PredictOptions::default()
                .test_targets(&ytest)
                .validation_error(true)
                .training_error(true)
                .uncertainty(true)
                .basis(&basis),
        )
        .expect("GP prediction");

    println!("Predictions (target, prediction, uncertainty)");
    println!(
        "{}",
        concatenate![
            Axis(1),
            ytest.clone().insert_axis(Axis(1)),
            pred.prediction.insert_axis(Axis(1)),
            pred.uncertainty.expect("uncertainty").insert_axis(Axis(1))
        ]
    );
    if let Some(report) = pred.validation_error {
        println!("Validation RMSE = {}", report.rmse.average);
    }
    if let Some(report) = pred.training_error {
        println!("Training RMSE = {}", report.rmse.average);
    }
    if let Some(analysis) = pred.basis_analysis {
        println!("Linear residual model coefficients = {}", analysis.beta);
        if let Some(report) = analysis.validation_error {
            println!("GP + linear model validation RMSE = {}", report.rmse.average);
        }
    }
    println!("LOO Q2 = {}", gp.looq2_score().expect("Q2 score"));
}
