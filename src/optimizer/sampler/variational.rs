use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;

use super::{Sample, Sampler, SamplerError};
use crate::domain::SolverBackend;
use crate::optimizer::Qubo;

/// Variational sampler over a product-state ansatz.
///
/// Each variable carries an activation probability, starting at 0.5. A fixed number of
/// layers update every probability from its mean field (linear term plus couplings weighted
/// by neighbour probabilities) at a falling temperature. The final state is measured
/// `shots` times; the rounded state and every shot compete by energy. Only QUBOs up to
/// `max_variables` are accepted.
#[derive(Debug, Clone, Copy)]
pub struct VariationalSampler {
    layers: usize,
    shots: usize,
    max_variables: usize,
    available: bool,
}

impl Default for VariationalSampler {
    fn default() -> Self {
        Self {
            layers: 8,
            shots: 64,
            max_variables: 16,
            available: true,
        }
    }
}

impl VariationalSampler {
    pub fn new(layers: usize, shots: usize, max_variables: usize) -> Self {
        Self {
            layers: layers.max(1),
            shots,
            max_variables,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Default::default()
        }
    }

    /// Mean-field passes; returns per-variable activation probabilities
    fn optimize_parameters(&self, qubo: &Qubo) -> Vec<f64> {
        let adj = qubo.adjacency();
        let scale = adj.max_flip_magnitude().max(f64::EPSILON);
        let mut probs = vec![0.5; qubo.len()];

        for layer in 0..self.layers {
            // Temperature falls linearly from `scale` to scale / layers
            let temperature = scale * (self.layers - layer) as f64 / self.layers as f64;
            for k in 0..probs.len() {
                let field = adj.linear[k]
                    + adj.neighbors[k]
                        .iter()
                        .map(|(j, c)| c * probs[*j])
                        .sum::<f64>();
                probs[k] = 1.0 / (1.0 + (field / temperature).exp());
            }
        }
        probs
    }
}

impl Sampler for VariationalSampler {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Variational
    }

    fn sample(&self, qubo: &Qubo, rng: &mut StdRng) -> Result<Sample, SamplerError> {
        if !self.available {
            return Err(SamplerError::Unavailable(
                "variational circuit simulator not configured".to_string(),
            ));
        }
        if qubo.len() > self.max_variables {
            return Err(SamplerError::TooLarge {
                variables: qubo.len(),
                limit: self.max_variables,
            });
        }

        let probs = self.optimize_parameters(qubo);
        let rounded: Vec<bool> = probs.iter().map(|p| *p > 0.5).collect();

        let shots = (0..self.shots).map(|_| {
            let bits = probs.iter().map(|p| rng.gen_bool(p.clamp(0.0, 1.0))).collect();
            Sample::evaluate(qubo, bits)
        });

        std::iter::once(Sample::evaluate(qubo, rounded))
            .chain(shots)
            .min_by_key(|s| OrderedFloat(s.energy))
            .ok_or_else(|| SamplerError::Unavailable("no measurement produced".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::sampler::test_support::frustrated;
    use rand::SeedableRng;

    #[test]
    fn test_qaoa_basic() {
        let mut q = Qubo::with_size(2);
        q.add_term(0, 0, -1.0);
        q.add_term(1, 1, -1.0);
        q.add_term(0, 1, 0.5);

        let mut rng = StdRng::seed_from_u64(0);
        let sample = VariationalSampler::default().sample(&q, &mut rng).unwrap();
        assert_eq!(sample.bits.len(), 2);
        assert_eq!(sample.energy, q.energy(&sample.bits));
        assert_eq!(sample.energy, -1.5);
    }

    #[test]
    fn test_rejects_oversized_qubo() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = VariationalSampler::new(4, 8, 3)
            .sample(&frustrated(), &mut rng)
            .unwrap_err();
        assert_eq!(err, SamplerError::TooLarge { variables: 4, limit: 3 });
    }

    #[test]
    fn test_probabilities_follow_linear_terms() {
        let mut q = Qubo::with_size(2);
        q.add_term(0, 0, -2.0);
        q.add_term(1, 1, 2.0);
        let probs = VariationalSampler::default().optimize_parameters(&q);
        assert!(probs[0] > 0.5);
        assert!(probs[1] < 0.5);
    }
}
