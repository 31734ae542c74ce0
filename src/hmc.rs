//! Hamiltonian Monte Carlo on an independent standard normal.
//!
//! Each column of the state is one chain of whitened coordinates. Pushing
//! the columns through a covariance square root (see [`Mvn`](crate::Mvn))
//! turns the chains into correlated function samples that wander
//! smoothly through the distribution instead of jumping between
//! independent draws.

use faer::{Mat, MatRef};
use log::trace;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{GpError, Result},
    math::{axpy, column, randn_from, vector_dot},
};

/// Settings for a single HMC transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HmcSettings {
    /// Leapfrog step size
    pub epsilon: f64,
    /// Number of leapfrog position updates per transition
    pub num_steps: usize,
}

impl Default for HmcSettings {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            num_steps: 2,
        }
    }
}

impl HmcSettings {
    fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.) {
            return Err(GpError::InvalidHyperparameter {
                name: "epsilon",
                value: self.epsilon,
            });
        }
        if self.num_steps == 0 {
            return Err(GpError::InvalidHyperparameter {
                name: "num_steps",
                value: 0.,
            });
        }
        Ok(())
    }
}

/// Outcome of one transition over all chains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmcStepStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Metropolis acceptance probability averaged over the chains
    pub mean_accept_prob: f64,
}

impl HmcStepStats {
    pub fn num_chains(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Running mean of acceptance probabilities across transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcceptanceRate {
    sum: f64,
    count: u64,
}

impl AcceptanceRate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stats: &HmcStepStats) {
        self.sum += stats.mean_accept_prob;
        self.count += 1;
    }

    /// `None` before the first transition.
    pub fn current(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0.;
        self.count = 0;
    }
}

fn potential(q: &[f64]) -> f64 {
    0.5 * vector_dot(q, q)
}

fn kinetic(p: &[f64]) -> f64 {
    0.5 * vector_dot(p, p)
}

/// Positions of a set of chains, one chain per column.
#[derive(Debug, Clone, PartialEq)]
pub struct HmcState {
    qs: Mat<f64>,
}

impl HmcState {
    pub fn new(qs: Mat<f64>) -> Self {
        Self { qs }
    }

    /// Chains started at an exact draw from the target.
    pub fn from_seed(dim: usize, num_chains: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::new(randn_from(&mut rng, dim, num_chains))
    }

    pub fn dim(&self) -> usize {
        self.qs.nrows()
    }

    pub fn num_chains(&self) -> usize {
        self.qs.ncols()
    }

    pub fn qs(&self) -> MatRef<'_, f64> {
        self.qs.as_ref()
    }

    pub fn into_inner(self) -> Mat<f64> {
        self.qs
    }

    /// One HMC transition of every chain.
    ///
    /// Momenta are drawn fresh, the leapfrog integrator takes
    /// `settings.num_steps` position steps and each chain is accepted on
    /// its own Metropolis test. A rejected chain is replaced by a new
    /// independent draw from the target instead of keeping its position,
    /// so an animation never stalls on a frame. The target is then only
    /// approximately stationary, with a bias that grows with the rejection
    /// rate.
    pub fn step<R: Rng + ?Sized>(&mut self, settings: &HmcSettings, rng: &mut R) -> Result<HmcStepStats> {
        settings.validate()?;
        let epsilon = settings.epsilon;
        let dim = self.dim();
        let num_chains = self.num_chains();

        let momenta = randn_from(rng, dim, num_chains);

        let mut accepted = 0;
        let mut prob_sum = 0.;

        for chain in 0..num_chains {
            let mut q = column(self.qs.as_ref(), chain);
            let mut p = column(momenta.as_ref(), chain);
            let start_energy = potential(&q) + kinetic(&p);

            // The gradient of the potential is the position itself.
            axpy(&q, &mut p, -epsilon / 2.);
            for step in 1..=settings.num_steps {
                axpy(&p, &mut q, epsilon);
                if step < settings.num_steps {
                    axpy(&q, &mut p, -epsilon);
                }
            }
            axpy(&q, &mut p, -epsilon / 2.);

            let end_energy = potential(&q) + kinetic(&p);
            let diff = start_energy - end_energy;
            let accept_prob = if diff.is_nan() { 0. } else { diff.min(0.).exp() };
            prob_sum += accept_prob;

            let draw: f64 = rng.random();
            if draw < accept_prob {
                accepted += 1;
                for (row, &val) in q.iter().enumerate() {
                    self.qs[(row, chain)] = val;
                }
            } else {
                for row in 0..dim {
                    self.qs[(row, chain)] = rng.sample(StandardNormal);
                }
            }
        }

        trace!("hmc step accepted {accepted} of {num_chains} chains");
        let mean_accept_prob = if num_chains == 0 {
            1.
        } else {
            prob_sum / num_chains as f64
        };
        Ok(HmcStepStats {
            accepted,
            rejected: num_chains - accepted,
            mean_accept_prob,
        })
    }
}

/// [`HmcState::step`] with a ChaCha8 generator seeded by `seed`.
pub fn hmc_step(state: &mut HmcState, epsilon: f64, num_steps: usize, seed: u64) -> Result<HmcStepStats> {
    let settings = HmcSettings { epsilon, num_steps };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    state.step(&settings, &mut rng)
}
