use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{DispatchError, DispatchProblem, DispatchResult};
use crate::domain::Schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Charge,
    Discharge,
    Idle,
}

/// Schedule, SoC walk and cost produced by a schedule-level backend
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedDispatch {
    pub schedule: Schedule,
    /// T+1 values, starting at the initial SoC
    pub soc_series: Vec<f64>,
    pub cost: f64,
}

/// A backend that turns a formulated problem directly into a schedule.
///
/// Implementations are synchronous and CPU-bound; the orchestrator runs them on the
/// blocking pool under a timeout.
pub trait OptimizationStrategy: Send + Sync {
    fn optimize(&self, problem: &DispatchProblem) -> DispatchResult<SolvedDispatch>;

    /// Whether the backing capability can be acquired at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Backend requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestedSolver {
    Milp,
    Anneal,
    Qaoa,
    Heuristic,
}

impl RequestedSolver {
    pub fn parse(raw: &str) -> DispatchResult<Self> {
        raw.parse()
            .map_err(|_| DispatchError::InvalidBackend(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("milp", RequestedSolver::Milp)]
    #[case("anneal", RequestedSolver::Anneal)]
    #[case("qaoa", RequestedSolver::Qaoa)]
    #[case("heuristic", RequestedSolver::Heuristic)]
    fn test_parse_known(#[case] raw: &str, #[case] expected: RequestedSolver) {
        assert_eq!(RequestedSolver::parse(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("teleport")]
    #[case("")]
    #[case("MILP ")]
    fn test_parse_unknown(#[case] raw: &str) {
        assert_eq!(
            RequestedSolver::parse(raw).unwrap_err(),
            DispatchError::InvalidBackend(raw.to_string())
        );
    }
}
