//! QUBO reformulation of the dispatch problem
//!
//! A reduced model for sampling backends: one binary "charge at t" and one "discharge at t"
//! variable per hour, no SoC dynamics. Each variable's linear term prices a full-power action
//! for that hour, and a pairwise penalty keeps the two actions of an hour apart. SoC limits
//! are applied afterwards, when the bitstring is translated into a schedule.

use std::collections::BTreeMap;
use std::fmt;

use super::{DispatchError, DispatchProblem, DispatchResult};

/// Default penalty for selecting charge and discharge in the same hour
pub const DEFAULT_PENALTY: f64 = 1000.0;

/// The penalty for an hour exceeds this multiple of that hour's largest linear term
const PENALTY_DOMINANCE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Charge,
    Discharge,
}

/// A named binary variable: an action at an hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuboVariable {
    pub hour: usize,
    pub role: Role,
}

impl QuboVariable {
    pub fn charge(hour: usize) -> Self {
        Self { hour, role: Role::Charge }
    }

    pub fn discharge(hour: usize) -> Self {
        Self { hour, role: Role::Discharge }
    }

    /// Position in the stable enumeration: charge and discharge of hour t at 2t and 2t+1
    pub fn index(&self) -> usize {
        match self.role {
            Role::Charge => 2 * self.hour,
            Role::Discharge => 2 * self.hour + 1,
        }
    }
}

impl fmt::Display for QuboVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Charge => write!(f, "ch_{}", self.hour),
            Role::Discharge => write!(f, "dis_{}", self.hour),
        }
    }
}

/// Sparse symmetric QUBO matrix.
///
/// Only the upper triangle is stored; `(i, i)` holds linear terms. Adding a term for
/// `(j, i)` accumulates into `(i, j)`, so the result does not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qubo {
    variables: Vec<QuboVariable>,
    terms: BTreeMap<(usize, usize), f64>,
}

impl Qubo {
    /// Matrix over `n` anonymous variables, named by index only
    pub fn with_size(n: usize) -> Self {
        let variables = (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    QuboVariable::charge(i / 2)
                } else {
                    QuboVariable::discharge(i / 2)
                }
            })
            .collect();
        Self {
            variables,
            terms: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[QuboVariable] {
        &self.variables
    }

    pub fn add_term(&mut self, i: usize, j: usize, coeff: f64) {
        assert!(
            i < self.len() && j < self.len(),
            "QUBO term ({i}, {j}) outside {} variables",
            self.len()
        );
        let key = if i <= j { (i, j) } else { (j, i) };
        *self.terms.entry(key).or_insert(0.0) += coeff;
    }

    pub fn coefficient(&self, i: usize, j: usize) -> f64 {
        let key = if i <= j { (i, j) } else { (j, i) };
        self.terms.get(&key).copied().unwrap_or(0.0)
    }

    pub fn terms(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.terms.iter().map(|(k, v)| (*k, *v))
    }

    /// Σ coeff · x_i · x_j over stored terms
    pub fn energy(&self, bits: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|((i, j), _)| bits[*i] && bits[*j])
            .map(|(_, coeff)| coeff)
            .sum()
    }

    /// Linear terms and per-variable couplings, for incremental energy updates
    pub fn adjacency(&self) -> Adjacency {
        let mut linear = vec![0.0; self.len()];
        let mut neighbors = vec![Vec::new(); self.len()];
        for (&(i, j), &coeff) in &self.terms {
            if i == j {
                linear[i] += coeff;
            } else {
                neighbors[i].push((j, coeff));
                neighbors[j].push((i, coeff));
            }
        }
        Adjacency { linear, neighbors }
    }

    pub fn bitstring(bits: &[bool]) -> String {
        bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Adjacency {
    pub linear: Vec<f64>,
    pub neighbors: Vec<Vec<(usize, f64)>>,
}

impl Adjacency {
    /// Energy change from flipping bit `k`
    pub fn flip_delta(&self, bits: &[bool], k: usize) -> f64 {
        let field = self.linear[k]
            + self.neighbors[k]
                .iter()
                .filter(|(j, _)| bits[*j])
                .map(|(_, c)| c)
                .sum::<f64>();
        if bits[k] {
            -field
        } else {
            field
        }
    }

    /// Largest possible |ΔE| of a single flip
    pub fn max_flip_magnitude(&self) -> f64 {
        self.linear
            .iter()
            .zip(&self.neighbors)
            .map(|(l, n)| l.abs() + n.iter().map(|(_, c)| c.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Smallest nonzero coefficient magnitude
    pub fn min_nonzero_magnitude(&self) -> f64 {
        self.linear
            .iter()
            .copied()
            .chain(self.neighbors.iter().flatten().map(|(_, c)| *c))
            .map(f64::abs)
            .filter(|c| *c > 0.0)
            .fold(f64::INFINITY, f64::min)
    }
}

/// Builds the hourly charge/discharge QUBO from a formulated problem
#[derive(Debug, Clone, Copy)]
pub struct QuboBuilder {
    pub penalty: f64,
}

impl Default for QuboBuilder {
    fn default() -> Self {
        Self {
            penalty: DEFAULT_PENALTY,
        }
    }
}

impl QuboBuilder {
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }

    pub fn build(&self, problem: &DispatchProblem) -> DispatchResult<Qubo> {
        let battery = &problem.battery;
        let mut qubo = Qubo::with_size(2 * problem.horizon());

        for (hour, &price) in problem.prices().iter().enumerate() {
            let ch = QuboVariable::charge(hour).index();
            let dis = QuboVariable::discharge(hour).index();

            let charge_term = price * (battery.max_charge_kw / battery.charge_efficiency);
            let discharge_term = -price * (battery.max_discharge_kw * battery.discharge_efficiency);
            let largest = charge_term.abs().max(discharge_term.abs());
            let penalty = self.penalty.max(PENALTY_DOMINANCE * largest + 1.0);

            if ![charge_term, discharge_term, penalty].iter().all(|c| c.is_finite()) {
                return Err(DispatchError::InvalidInput(format!(
                    "QUBO coefficients for hour {hour} are not finite (price {price})"
                )));
            }

            qubo.add_term(ch, ch, charge_term);
            qubo.add_term(dis, dis, discharge_term);
            qubo.add_term(ch, dis, penalty);
        }

        Ok(qubo)
    }
}
