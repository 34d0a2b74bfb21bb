use fitrank_acq::{rank, rank_by_class, AcquisitionConfig, RankInput, Strategy};
use fitrank_gp::{GaussianProcess, KernelSpec, PredictOptions};
use linfa::prelude::{Dataset, Fit};
use ndarray::{Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn fitness(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| -row.mapv(|v| (v - 0.3) * (v - 0.3)).sum())
}

#[test]
fn test_rank_gp_predictions() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let train_features = Array::random_using((45, 4), Uniform::new(0., 1.), &mut rng);
    let targets = fitness(&train_features);
    let test_features = Array::random_using((5, 4), Uniform::new(0., 1.), &mut rng);
    let test_targets = fitness(&test_features);

    let gp = GaussianProcess::params(vec![KernelSpec::gaussian().with_width(1.).with_scaling(1.)])
        .regularization(1e-3)
        .optimize_hyperparameters(true)
        .scale_data(true)
        .fit(&Dataset::new(train_features.clone(), targets.clone()))
        .expect("GP fit error");
    let pred = gp
        .predict_with(
            &test_features,
            &PredictOptions::default()
                .test_targets(&test_targets)
                .validation_error(true)
                .training_error(true)
                .uncertainty(true),
        )
        .expect("GP prediction");
    assert!(pred.validation_error.is_some());
    let uncertainty = pred.uncertainty.expect("uncertainty");

    let input = RankInput {
        targets: targets.view(),
        predictions: pred.prediction.view(),
        uncertainty: uncertainty.view(),
        train_features: train_features.view(),
        test_features: test_features.view(),
    };
    let scores = rank(&input, &Strategy::NAMES, &AcquisitionConfig::default())
        .expect("ranking");
    for name in Strategy::NAMES {
        assert_eq!(scores[name].len(), pred.prediction.len());
        assert!(scores[name].iter().all(|v| v.is_finite()));
    }
    assert!(scores["cdf"].iter().all(|v| (0. ..=1.).contains(v)));
    assert!(scores["PI"].iter().all(|v| (0. ..=1.).contains(v)));
    assert!(scores["EI"].iter().all(|v| *v >= 0.));

    let train_classes: Vec<usize> = (0..45).map(|i| i % 3).collect();
    let test_classes = vec![0, 1, 2, 3, 0];
    let by_class = rank_by_class(
        &input,
        &train_classes,
        &test_classes,
        &["EI", "gaussian"],
        &AcquisitionConfig::default(),
    )
    .expect("ranking by class");
    assert_eq!(by_class["EI"].len(), 5);
    assert_eq!(by_class["gaussian"], scores["gaussian"]);
    // the unseen class is compared to the global best
    assert_eq!(by_class["EI"][3], scores["EI"][3]);
}
