use approx::assert_abs_diff_eq;
use faer::Mat;
use gp_explorer::{
    bracket, build_catmull_rom, cov_ellipse, fit_posterior, hmc_step, kernel_choices, linspace,
    make_kernel, product, randn, sample_mvn, sample_mvn_trajectory, sum, AcceptanceRate,
    GaussianProcess, GpError, HmcSettings, HmcState, Kernel, KernelKind, Mvn, SharedKernel, SqrtSettings,
};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

const X: [f64; 5] = [-1.0, 0.3, 1.1, 2.4, 3.3];
const Y: [f64; 5] = [0.2, -0.6, 0.4, 1.5, 0.9];

fn posterior(kind: KernelKind) -> gp_explorer::GpModel {
    let defaults: Vec<f64> = kind.parameters().iter().map(|p| p.default).collect();
    let kernel = make_kernel(kind, &defaults).unwrap();
    fit_posterior(kernel, &X, &Y, 0.01).unwrap()
}

#[test]
fn posterior_samples_animate() {
    let model = posterior(KernelKind::Matern32);
    let xs = linspace(-2., 4., 40);
    let prediction = model.predict(&xs);
    let mvn = Mvn::from_prediction(&prediction, SqrtSettings::default()).unwrap();

    let v = randn(mvn.whitened_dim(), 1, 1);
    let v_col: Vec<f64> = (0..v.nrows()).map(|i| v[(i, 0)]).collect();
    let traj = sample_mvn_trajectory(prediction.mean.as_slice(), mvn.cov_sqrt(), Some(&v_col), 30, 2)
        .unwrap()
        .unwrap();
    assert_eq!(traj.len(), 30);

    let direct = sample_mvn(&prediction.mean, mvn.cov_sqrt(), Some(v.as_ref()))
        .unwrap()
        .unwrap();
    let first = traj.frame(0).unwrap();
    for i in 0..xs.len() {
        assert_abs_diff_eq!(first[i], direct[(i, 0)], epsilon = 1e-10);
    }

    // near the data every frame stays close to the observations
    let near = bracket(&xs, X[2]).unwrap();
    for frame in traj.iter() {
        let at_data = near.interpolate(&frame).unwrap();
        assert!((at_data - Y[2]).abs() < 1.0, "{at_data}");
    }
}

#[test]
fn hmc_chains_drive_samples() {
    let model = posterior(KernelKind::SquaredExponential);
    let xs = linspace(-1., 3.3, 25);
    let prediction = model.predict(&xs);
    let mvn = Mvn::from_prediction(&prediction, SqrtSettings::default()).unwrap();

    let mut state = HmcState::from_seed(mvn.whitened_dim(), 4, 10);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let settings = HmcSettings::default();
    let mut rate = AcceptanceRate::new();

    let mut keyframes = vec![mvn.sample(Some(state.qs())).unwrap()];
    for _ in 0..4 {
        rate.add(&state.step(&settings, &mut rng).unwrap());
        keyframes.push(mvn.sample(Some(state.qs())).unwrap());
    }
    assert!(rate.current().unwrap() > 0.8);

    let [p0, p1, p2, p3] = [0, 1, 2, 3].map(|k| keyframes[k].clone());
    let curve = build_catmull_rom(p0, p1.clone(), p2.clone(), p3).unwrap();
    let (start, end) = (curve(0.), curve(1.));
    for i in 0..xs.len() {
        for j in 0..4 {
            assert_abs_diff_eq!(start[(i, j)], p1[(i, j)], epsilon = 1e-8);
            assert_abs_diff_eq!(end[(i, j)], p2[(i, j)], epsilon = 1e-8);
        }
    }

    let mut seeded = HmcState::from_seed(3, 2, 0);
    hmc_step(&mut seeded, 0.1, 2, 5).unwrap();
    assert!(seeded.qs()[(0, 0)].is_finite());
}

#[test]
fn every_kernel_fits() {
    let choices = kernel_choices();
    assert_eq!(choices.choices[choices.selected].kind(), KernelKind::SquaredExponential);
    for selection in &choices.choices {
        let model = fit_posterior(selection.instantiate().unwrap(), &X, &Y, 0.1).unwrap();
        let out = model.predict(&linspace(-1., 4., 12));
        for i in 0..12 {
            assert!(out.cov[(i, i)] >= 0.);
        }
        let (_, cov) = out.pair(2, 7).unwrap();
        let ellipse = cov_ellipse(cov.as_ref()).unwrap();
        assert!(ellipse.width <= ellipse.length);
    }
}

#[test]
fn composite_kernels() {
    let se = make_kernel(KernelKind::SquaredExponential, &[1., 2.]).unwrap();
    let per = make_kernel(KernelKind::Periodic, &[1., 1., 1.5]).unwrap();
    let kernel: SharedKernel = Arc::new(product([se.clone(), per.clone()]));
    let model = fit_posterior(kernel, &X, &Y, 1e-4).unwrap();
    let out = model.predict(&X);
    for (mean, y) in out.mean.iter().zip(Y) {
        assert!((mean - y).abs() < 0.1);
    }

    let added: SharedKernel = Arc::new(sum([se, per]));
    assert_abs_diff_eq!(added.eval(0.5, 0.5), 2.);
}

#[test]
fn duplicate_inputs_need_noise() {
    let kernel = make_kernel(KernelKind::Matern52, &[1., 1.]).unwrap();
    let xs = [2., 2., 0.];
    let ys = [1., 1., 0.];
    assert!(matches!(
        fit_posterior(kernel.clone(), &xs, &ys, 0.),
        Err(GpError::NotPositiveDefinite { .. })
    ));
    assert!(fit_posterior(kernel, &xs, &ys, 1e-4).is_ok());

    let singular = Mat::from_fn(2, 2, |_, _| 1.);
    let v = randn(2, 1, 0);
    assert!(sample_mvn(&[0., 0.], singular.as_ref(), Some(v.as_ref())).is_ok());
}
