//! Approximate QUBO solvers
//!
//! Two interchangeable sampling strategies (simulated annealing and a variational
//! mean-field sampler) share one contract: take a QUBO, return the best bitstring found and
//! its energy. When the preferred strategy is unavailable, too large or out of time, a
//! seeded multi-restart local search runs instead. The reported energy is always recomputed
//! with [`Qubo::energy`], whichever strategy picked the bits.

pub mod anneal;
pub mod local_search;
pub mod variational;

pub use anneal::AnnealingSampler;
pub use local_search::LocalSearchSampler;
pub use variational::VariationalSampler;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, warn};

use super::Qubo;
use crate::domain::SolverBackend;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error("Sampling capability unavailable: {0}")]
    Unavailable(String),

    #[error("Sampling exceeded its time budget")]
    TimedOut,

    #[error("QUBO has {variables} variables, sampler supports at most {limit}")]
    TooLarge { variables: usize, limit: usize },
}

/// Best assignment found for a QUBO
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub bits: Vec<bool>,
    pub energy: f64,
}

impl Sample {
    pub fn evaluate(qubo: &Qubo, bits: Vec<bool>) -> Self {
        let energy = qubo.energy(&bits);
        Self { bits, energy }
    }

    pub fn bitstring(&self) -> String {
        Qubo::bitstring(&self.bits)
    }
}

/// A QUBO sampling strategy
pub trait Sampler: Send + Sync {
    fn backend(&self) -> SolverBackend;

    fn sample(&self, qubo: &Qubo, rng: &mut StdRng) -> Result<Sample, SamplerError>;
}

/// Sample plus the strategy that actually produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ApproximateOutcome {
    pub sample: Sample,
    pub backend: SolverBackend,
}

/// Runs a preferred sampler with the local-search fallback behind it. Never fails.
pub struct ApproximateSolver {
    strategy: Box<dyn Sampler>,
    fallback: LocalSearchSampler,
}

impl ApproximateSolver {
    pub fn new(strategy: Box<dyn Sampler>, fallback: LocalSearchSampler) -> Self {
        Self { strategy, fallback }
    }

    pub fn solve(&self, qubo: &Qubo, seed: u64) -> ApproximateOutcome {
        if qubo.is_empty() {
            return ApproximateOutcome {
                sample: Sample {
                    bits: Vec::new(),
                    energy: 0.0,
                },
                backend: self.strategy.backend(),
            };
        }

        let mut rng = StdRng::seed_from_u64(seed);
        match self.strategy.sample(qubo, &mut rng) {
            Ok(sample) => {
                debug!(backend = %self.strategy.backend(), energy = sample.energy, "sampler finished");
                ApproximateOutcome {
                    sample: Sample::evaluate(qubo, sample.bits),
                    backend: self.strategy.backend(),
                }
            }
            Err(e) => {
                warn!(
                    backend = %self.strategy.backend(),
                    error = %e,
                    "sampler failed, using randomized local search"
                );
                self.fallback_outcome(qubo, &mut rng)
            }
        }
    }

    /// Local search only, for when the preferred strategy cannot even be started
    pub fn solve_fallback(&self, qubo: &Qubo, seed: u64) -> ApproximateOutcome {
        let mut rng = StdRng::seed_from_u64(seed);
        self.fallback_outcome(qubo, &mut rng)
    }

    fn fallback_outcome(&self, qubo: &Qubo, rng: &mut StdRng) -> ApproximateOutcome {
        let sample = self.fallback.search(qubo, rng);
        ApproximateOutcome {
            sample: Sample::evaluate(qubo, sample.bits),
            backend: SolverBackend::LocalSearch,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Small frustrated QUBO with a unique minimum at 0b1010 (energy -4)
    pub fn frustrated() -> Qubo {
        let mut q = Qubo::with_size(4);
        q.add_term(0, 0, -2.0);
        q.add_term(1, 1, -1.0);
        q.add_term(2, 2, -2.0);
        q.add_term(3, 3, -1.0);
        q.add_term(0, 1, 3.0);
        q.add_term(2, 3, 3.0);
        q.add_term(1, 2, 1.0);
        q
    }

    pub struct FailingSampler(pub SamplerError);

    impl Sampler for FailingSampler {
        fn backend(&self) -> SolverBackend {
            SolverBackend::Anneal
        }

        fn sample(&self, _qubo: &Qubo, _rng: &mut StdRng) -> Result<Sample, SamplerError> {
            Err(self.0.clone())
        }
    }

    /// Claims a wrong energy, to check the solver recomputes it
    pub struct LyingSampler;

    impl Sampler for LyingSampler {
        fn backend(&self) -> SolverBackend {
            SolverBackend::Variational
        }

        fn sample(&self, qubo: &Qubo, _rng: &mut StdRng) -> Result<Sample, SamplerError> {
            Ok(Sample {
                bits: vec![true; qubo.len()],
                energy: -1e9,
            })
        }
    }
}
