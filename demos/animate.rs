//! Fit a posterior and print an animated sample as text frames.
use anyhow::{Context, Result};
use gp_explorer::{
    build_catmull_rom, bracket, fit_posterior, kernel_choices, linspace, randn, AcceptanceRate,
    GaussianProcess, HmcSettings, HmcState, Mvn, SqrtSettings,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const WIDTH: usize = 60;

fn render(values: &[f64], lo: f64, hi: f64) -> String {
    let grid = linspace(lo, hi, WIDTH);
    values
        .iter()
        .map(|&y| {
            let pos = bracket(&grid, y.clamp(lo, hi)).map(|b| if b.w1 >= 0.5 { b.idx1 } else { b.idx2 });
            match pos {
                Ok(pos) => format!("{}*", " ".repeat(pos)),
                Err(_) => "?".to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn main() -> Result<()> {
    let choices = kernel_choices();
    let mut selection = choices.choices[choices.selected].clone();
    selection.set("lengthscale", 0.8);
    let kernel = selection.instantiate()?;

    let obs_x = [-1.5, -0.4, 0.7, 1.9];
    let obs_y = [0.3, -0.8, 0.5, 1.1];
    let model = fit_posterior(kernel, &obs_x, &obs_y, 0.01)?;

    let xs = linspace(-3., 3., 12);
    let prediction = model.predict(&xs);
    let mvn = Mvn::from_prediction(&prediction, SqrtSettings::default())?;

    let v = randn(mvn.whitened_dim(), 1, 1);
    let v: Vec<f64> = (0..v.nrows()).map(|i| v[(i, 0)]).collect();
    let trajectory = mvn.trajectory(Some(&v), 8, 2).context("sample has the wrong size")?;

    for (idx, frame) in trajectory.iter().enumerate() {
        println!("frame {idx} (angle {:.2})", trajectory.angle(idx));
        println!("{}\n", render(&frame, -3., 3.));
    }

    let mut state = HmcState::from_seed(mvn.whitened_dim(), 1, 3);
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let settings = HmcSettings::default();
    let mut rate = AcceptanceRate::new();
    let mut keyframes = vec![];
    for _ in 0..4 {
        rate.add(&state.step(&settings, &mut rng)?);
        keyframes.push(mvn.sample(Some(state.qs())).context("chain has the wrong size")?);
    }
    println!("hmc acceptance rate {:.3}", rate.current().unwrap_or(0.));

    let [p0, p1, p2, p3] = [0, 1, 2, 3].map(|k| keyframes[k].clone());
    let curve = build_catmull_rom(p0, p1, p2, p3)?;
    for w in linspace(0., 1., 3) {
        let point = curve(w);
        let values: Vec<f64> = (0..point.nrows()).map(|i| point[(i, 0)]).collect();
        println!("spline w = {w:.1}");
        println!("{}\n", render(&values, -3., 3.));
    }
    Ok(())
}
