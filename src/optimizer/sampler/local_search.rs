use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;

use super::Sample;
use crate::optimizer::Qubo;

/// Lower bound on restarts for the fallback search
pub const MIN_RESTARTS: usize = 20;

/// Randomized multi-restart steepest-descent search over single bit flips.
///
/// Every restart begins from a uniformly random assignment and flips the most improving
/// bit until no flip lowers the energy (or `max_passes` is reached). The lowest-energy
/// assignment over all restarts wins.
#[derive(Debug, Clone, Copy)]
pub struct LocalSearchSampler {
    restarts: usize,
    max_passes: usize,
}

impl Default for LocalSearchSampler {
    fn default() -> Self {
        Self {
            restarts: 32,
            max_passes: 1_000,
        }
    }
}

impl LocalSearchSampler {
    /// `restarts` is raised to [`MIN_RESTARTS`] if lower
    pub fn new(restarts: usize, max_passes: usize) -> Self {
        Self {
            restarts: restarts.max(MIN_RESTARTS),
            max_passes: max_passes.max(1),
        }
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn search(&self, qubo: &Qubo, rng: &mut StdRng) -> Sample {
        let n = qubo.len();
        if n == 0 {
            return Sample {
                bits: Vec::new(),
                energy: 0.0,
            };
        }
        let adj = qubo.adjacency();

        (0..self.restarts)
            .map(|_| {
                let mut bits: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
                for _ in 0..self.max_passes {
                    let best = (0..n)
                        .map(|k| (k, adj.flip_delta(&bits, k)))
                        .min_by_key(|(_, delta)| OrderedFloat(*delta));
                    match best {
                        Some((k, delta)) if delta < 0.0 => bits[k] = !bits[k],
                        _ => break,
                    }
                }
                Sample::evaluate(qubo, bits)
            })
            .min_by_key(|s| OrderedFloat(s.energy))
            .unwrap_or_else(|| Sample::evaluate(qubo, vec![false; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::sampler::test_support::frustrated;
    use rand::SeedableRng;

    #[test]
    fn test_restarts_floor() {
        assert_eq!(LocalSearchSampler::new(3, 10).restarts(), MIN_RESTARTS);
        assert_eq!(LocalSearchSampler::new(64, 10).restarts(), 64);
    }

    #[test]
    fn test_finds_frustrated_minimum() {
        let mut rng = StdRng::seed_from_u64(11);
        let sample = LocalSearchSampler::default().search(&frustrated(), &mut rng);
        assert_eq!(sample.bits, vec![true, false, true, false]);
        assert_eq!(sample.energy, -4.0);
    }

    #[test]
    fn test_result_is_local_minimum() {
        let qubo = frustrated();
        let adj = qubo.adjacency();
        let mut rng = StdRng::seed_from_u64(5);
        let sample = LocalSearchSampler::default().search(&qubo, &mut rng);

        for k in 0..qubo.len() {
            assert!(adj.flip_delta(&sample.bits, k) >= 0.0);
        }
    }
}
