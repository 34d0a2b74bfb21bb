use criterion::{criterion_group, criterion_main, Criterion};
use fitrank_gp::{GaussianProcess, KernelKind, KernelSpec, OptimizerConfig, PredictOptions};
use linfa::prelude::{Dataset, Fit};
use ndarray::{Array, Array1, Zip};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_gp(c: &mut Criterion) {
    let dims = [5, 10, 20];
    let nts = [100, 200, 300];

    let mut group = c.benchmark_group("gp");
    group.sample_size(20);
    for (&dim, &nt) in dims.iter().zip(nts.iter()) {
        let griewank = |x: &Array1<f64>| -> f64 {
            let d = Array1::linspace(1., dim as f64, dim).mapv(|v| v.sqrt());
            x.mapv(|v| v * v).sum() / 4000. - (x / &d).mapv(|v| v.cos()).fold(1., |acc, x| acc * x)
                + 1.0
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let xt = Array::random_using((nt, dim), Uniform::new(-600., 600.), &mut rng);
        let mut yt: Array1<f64> = Array1::zeros(xt.nrows());
        Zip::from(&mut yt).and(xt.rows()).par_for_each(|y, x| {
            *y = griewank(&x.to_owned());
        });

        group.bench_function(format!("gp fit {dim}"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    GaussianProcess::params(vec![KernelSpec::new(KernelKind::Matern52)])
                        .scale_data(true)
                        .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
                        .expect("GP fit error"),
                )
            });
        });

        let gp = GaussianProcess::params(vec![KernelSpec::gaussian()])
            .scale_data(true)
            .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
            .expect("GP fit error");
        group.bench_function(format!("gp predict {dim}"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    gp.predict_with(&xt, &PredictOptions::default().uncertainty(true))
                        .expect("GP prediction"),
                )
            });
        });
    }

    let mut rng = Xoshiro256Plus::seed_from_u64(0);
    let xt = Array::random_using((50, 3), Uniform::new(-1., 1.), &mut rng);
    let yt = xt.map_axis(ndarray::Axis(1), |x| x.mapv(|v: f64| v.sin()).sum());
    group.bench_function("gp optimized fit", |b| {
        b.iter(|| {
            std::hint::black_box(
                GaussianProcess::params(vec![KernelSpec::gaussian(), KernelSpec::linear()])
                    .optimize_hyperparameters(true)
                    .optimizer(OptimizerConfig::default().n_start(2))
                    .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
                    .expect("GP fit error"),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, criterion_gp);
criterion_main!(benches);
