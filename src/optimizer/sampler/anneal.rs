use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;

use super::{Sample, Sampler, SamplerError};
use crate::domain::SolverBackend;
use crate::optimizer::Qubo;

/// Simulated annealing over single bit flips with a geometric inverse-temperature schedule.
///
/// Each read starts from a random assignment and performs `sweeps` Metropolis sweeps while
/// beta rises from hot to cold. The inverse-temperature range is derived from the QUBO's
/// coefficient magnitudes: the hot end accepts the largest possible uphill flip half the
/// time, the cold end accepts the smallest uphill flip once in a hundred.
#[derive(Debug, Clone, Copy)]
pub struct AnnealingSampler {
    num_reads: usize,
    sweeps: usize,
    time_budget: Duration,
    available: bool,
}

impl Default for AnnealingSampler {
    fn default() -> Self {
        Self {
            num_reads: 200,
            sweeps: 1_000,
            time_budget: Duration::from_secs(5),
            available: true,
        }
    }
}

impl AnnealingSampler {
    pub fn new(num_reads: usize, sweeps: usize, time_budget: Duration) -> Self {
        Self {
            num_reads: num_reads.max(1),
            sweeps: sweeps.max(1),
            time_budget,
            available: true,
        }
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// A sampler whose backing capability is missing
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Default::default()
        }
    }

    fn beta_schedule(&self, qubo: &Qubo) -> Vec<f64> {
        let adj = qubo.adjacency();
        let max_delta = adj.max_flip_magnitude();
        let min_delta = adj.min_nonzero_magnitude();
        if max_delta <= 0.0 || !min_delta.is_finite() {
            return vec![1.0; self.sweeps];
        }

        let hot = std::f64::consts::LN_2 / max_delta;
        let cold = (100.0f64).ln() / min_delta;
        let (hot, cold) = if cold > hot { (hot, cold) } else { (cold, hot) };
        if self.sweeps == 1 {
            return vec![cold];
        }
        let ratio = (cold / hot).powf(1.0 / (self.sweeps - 1) as f64);
        (0..self.sweeps).map(|s| hot * ratio.powi(s as i32)).collect()
    }
}

impl Sampler for AnnealingSampler {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Anneal
    }

    fn sample(&self, qubo: &Qubo, rng: &mut StdRng) -> Result<Sample, SamplerError> {
        if !self.available {
            return Err(SamplerError::Unavailable(
                "simulated annealing sampler not configured".to_string(),
            ));
        }

        let started = Instant::now();
        let n = qubo.len();
        let adj = qubo.adjacency();
        let betas = self.beta_schedule(qubo);

        let mut best: Option<Sample> = None;
        for _ in 0..self.num_reads {
            if started.elapsed() > self.time_budget {
                return Err(SamplerError::TimedOut);
            }

            let mut bits: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
            for &beta in &betas {
                for k in 0..n {
                    let delta = adj.flip_delta(&bits, k);
                    if delta <= 0.0 || rng.gen::<f64>() < (-beta * delta).exp() {
                        bits[k] = !bits[k];
                    }
                }
            }

            let read = Sample::evaluate(qubo, bits);
            best = match best {
                Some(b) if OrderedFloat(b.energy) <= OrderedFloat(read.energy) => Some(b),
                _ => Some(read),
            };
        }

        best.ok_or_else(|| SamplerError::Unavailable("annealer produced no reads".to_string()))
    }
}
