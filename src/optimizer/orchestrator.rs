//! Dispatch orchestration
//!
//! Picks the backend for a request, enforces the fallback chain and normalizes every
//! outcome into a [`SolutionResult`]:
//!
//! - `milp`: exact solver; `SolverUnavailable`, `Infeasible`, timeout or a crashed solver
//!   task fall back to the heuristic and report `heuristic-fallback`.
//! - `anneal` / `qaoa`: build the QUBO and sample it. Sampler failures are absorbed by the
//!   local-search fallback (reported as `local-search`); a QUBO that cannot be built falls
//!   back to the heuristic.
//! - `heuristic`: greedy controller directly.
//!
//! Unknown solver names and malformed input are returned to the caller without fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{info, warn};

use super::sampler::{
    AnnealingSampler, ApproximateOutcome, ApproximateSolver, LocalSearchSampler, Sampler,
    VariationalSampler,
};
use super::{
    greedy::step_soc, DispatchError, DispatchProblem, DispatchResult, ExactSolver,
    HeuristicSolver, OptimizationStrategy, Qubo, QuboBuilder, QuboVariable, RequestedSolver,
    SolvedDispatch,
};
use crate::config::SolverConfig;
use crate::domain::{
    BatteryConstraints, BatterySpec, DispatchSeries, HourPlan, SampleSummary, Schedule,
    SolutionResult, SolverBackend,
};

/// A dispatch request as handed over by the transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(flatten)]
    pub series: DispatchSeries,
    #[serde(default)]
    pub constraints: BatteryConstraints,
    #[serde(default = "default_solver")]
    pub solver: String,
}

fn default_solver() -> String {
    RequestedSolver::Milp.to_string()
}

#[derive(Clone)]
pub struct DispatchOrchestrator {
    exact: Arc<dyn OptimizationStrategy>,
    heuristic: HeuristicSolver,
    qubo: QuboBuilder,
    annealer: AnnealingSampler,
    variational: VariationalSampler,
    local_search: LocalSearchSampler,
    defaults: BatterySpec,
    exact_timeout: Duration,
    sampling_timeout: Duration,
    exact_permits: Arc<Semaphore>,
    seed: Option<u64>,
}

impl DispatchOrchestrator {
    pub fn new(cfg: &SolverConfig, defaults: BatterySpec) -> Self {
        Self {
            exact: Arc::new(ExactSolver::default()),
            heuristic: HeuristicSolver::default(),
            qubo: QuboBuilder::new(cfg.qubo_penalty),
            annealer: AnnealingSampler::new(
                cfg.anneal_reads,
                cfg.anneal_sweeps,
                cfg.anneal_budget(),
            ),
            variational: VariationalSampler::new(
                cfg.variational_layers,
                cfg.variational_shots,
                cfg.variational_max_variables,
            ),
            local_search: LocalSearchSampler::new(
                cfg.local_search_restarts,
                cfg.local_search_max_passes,
            ),
            defaults,
            exact_timeout: cfg.exact_timeout(),
            sampling_timeout: cfg.sampling_timeout(),
            exact_permits: Arc::new(Semaphore::new(cfg.max_concurrent_exact.max(1))),
            seed: cfg.seed,
        }
    }

    /// Replace the exact backend, e.g. with [`ExactSolver::unavailable`]
    pub fn with_exact_strategy(mut self, exact: Arc<dyn OptimizationStrategy>) -> Self {
        self.exact = exact;
        self
    }

    pub fn with_annealer(mut self, annealer: AnnealingSampler) -> Self {
        self.annealer = annealer;
        self
    }

    pub fn with_variational(mut self, variational: VariationalSampler) -> Self {
        self.variational = variational;
        self
    }

    pub fn exact_available(&self) -> bool {
        self.exact.is_available()
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResult<SolutionResult> {
        let requested = RequestedSolver::parse(&request.solver)?;
        let battery = self.defaults.with_overrides(&request.constraints);
        let problem = Arc::new(DispatchProblem::formulate(request.series, battery)?);

        let started = Instant::now();
        let result = match requested {
            RequestedSolver::Milp => self.run_exact(&problem).await,
            RequestedSolver::Heuristic => Ok(self.normalize(
                self.heuristic.solve(&problem),
                SolverBackend::Heuristic,
            )),
            RequestedSolver::Anneal => {
                self.run_approximate(&problem, Box::new(self.annealer)).await
            }
            RequestedSolver::Qaoa => {
                self.run_approximate(&problem, Box::new(self.variational)).await
            }
        }?;

        info!(
            requested = %requested,
            solver = %result.solver,
            horizon = problem.horizon(),
            cost = result.cost,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch solved"
        );
        Ok(result)
    }

    async fn run_exact(&self, problem: &Arc<DispatchProblem>) -> DispatchResult<SolutionResult> {
        match self.solve_exact(problem).await {
            Ok(solved) => Ok(self.normalize(solved, SolverBackend::Exact)),
            Err(e) if e.is_recoverable() => {
                warn!(
                    requested = %RequestedSolver::Milp,
                    solver = %SolverBackend::HeuristicFallback,
                    reason = %e,
                    "exact solver failed, falling back to heuristic"
                );
                Ok(self.heuristic_fallback(problem))
            }
            Err(e) => Err(e),
        }
    }

    /// Run the exact strategy on the blocking pool while holding a capability permit.
    /// The permit moves into the task, so it is released however the task ends. Waiting
    /// for the permit counts against the same deadline as the solve: a permit still held
    /// by an abandoned solve makes this request fall back instead of queueing.
    async fn solve_exact(&self, problem: &Arc<DispatchProblem>) -> DispatchResult<SolvedDispatch> {
        let deadline = Instant::now() + self.exact_timeout;

        let permit = match timeout_at(deadline, Arc::clone(&self.exact_permits).acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => {
                return Err(DispatchError::SolverUnavailable(format!("capability closed: {e}")))
            }
            Err(_) => {
                return Err(DispatchError::SolverUnavailable(format!(
                    "exact capability busy for {} ms",
                    self.exact_timeout.as_millis()
                )))
            }
        };

        let exact = Arc::clone(&self.exact);
        let problem = Arc::clone(problem);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            exact.optimize(&problem)
        });

        match timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(DispatchError::SolverUnavailable(format!(
                "exact solver task failed: {join}"
            ))),
            Err(_) => Err(DispatchError::SolverUnavailable(format!(
                "exact solver exceeded {} ms",
                self.exact_timeout.as_millis()
            ))),
        }
    }

    async fn run_approximate(
        &self,
        problem: &Arc<DispatchProblem>,
        strategy: Box<dyn Sampler>,
    ) -> DispatchResult<SolutionResult> {
        let requested = strategy.backend();
        let qubo = match self.qubo.build(problem) {
            Ok(qubo) => Arc::new(qubo),
            Err(e) => {
                warn!(
                    requested = %requested,
                    solver = %SolverBackend::HeuristicFallback,
                    reason = %e,
                    "QUBO could not be built, falling back to heuristic"
                );
                return Ok(self.heuristic_fallback(problem));
            }
        };

        let seed = self.seed.unwrap_or_else(rand::random);
        info!(solver = %requested, seed, variables = qubo.len(), "sampling QUBO");

        let solver = Arc::new(ApproximateSolver::new(strategy, self.local_search));
        let task = {
            let solver = Arc::clone(&solver);
            let qubo = Arc::clone(&qubo);
            tokio::task::spawn_blocking(move || solver.solve(&qubo, seed))
        };

        let outcome = match timeout(self.sampling_timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join)) => {
                self.recover_with_local_search(solver, qubo, seed, format!("task failed: {join}"))
                    .await?
            }
            Err(_) => {
                let reason = format!("exceeded {} ms", self.sampling_timeout.as_millis());
                self.recover_with_local_search(solver, qubo, seed, reason).await?
            }
        };

        Ok(self.normalize_sample(problem, outcome))
    }

    async fn recover_with_local_search(
        &self,
        solver: Arc<ApproximateSolver>,
        qubo: Arc<Qubo>,
        seed: u64,
        reason: String,
    ) -> DispatchResult<ApproximateOutcome> {
        warn!(
            solver = %SolverBackend::LocalSearch,
            %reason,
            "sampler did not finish, using randomized local search"
        );
        tokio::task::spawn_blocking(move || solver.solve_fallback(&qubo, seed))
            .await
            .map_err(|e| DispatchError::SolverUnavailable(format!("local search task failed: {e}")))
    }

    fn heuristic_fallback(&self, problem: &DispatchProblem) -> SolutionResult {
        self.normalize(self.heuristic.solve(problem), SolverBackend::HeuristicFallback)
    }

    fn normalize(&self, solved: SolvedDispatch, solver: SolverBackend) -> SolutionResult {
        SolutionResult {
            schedule: solved.schedule,
            soc_series: Some(solved.soc_series),
            cost: solved.cost,
            solver,
            feasible: true,
            sample: None,
        }
    }

    fn normalize_sample(&self, problem: &DispatchProblem, outcome: ApproximateOutcome) -> SolutionResult {
        let feasible = respects_exclusion(&outcome.sample.bits);
        let solved = schedule_from_bits(problem, &outcome.sample.bits);
        SolutionResult {
            schedule: solved.schedule,
            soc_series: Some(solved.soc_series),
            cost: solved.cost,
            solver: outcome.backend,
            feasible,
            sample: Some(SampleSummary {
                bitstring: outcome.sample.bitstring(),
                energy: outcome.sample.energy,
            }),
        }
    }
}

fn respects_exclusion(bits: &[bool]) -> bool {
    bits.chunks(2).all(|pair| !(pair.len() == 2 && pair[0] && pair[1]))
}

/// Translate a charge/discharge bitstring into a schedule.
///
/// A selected action runs at the capped power, limited to what the SoC walk allows.
/// Discharge is further limited to what the load and the export cap absorb, so curtailment
/// only ever takes PV. An hour with both or neither bit set holds.
pub fn schedule_from_bits(problem: &DispatchProblem, bits: &[bool]) -> SolvedDispatch {
    let battery = &problem.battery;
    let bit = |v: QuboVariable| bits.get(v.index()).copied().unwrap_or(false);

    let mut soc = battery.initial_soc;
    let mut soc_series = Vec::with_capacity(problem.horizon() + 1);
    soc_series.push(soc);

    let hours = problem
        .net_demand
        .iter()
        .enumerate()
        .map(|(hour, &net)| {
            let (charge_kw, discharge_kw) =
                match (bit(QuboVariable::charge(hour)), bit(QuboVariable::discharge(hour))) {
                    (true, false) => (battery.max_charge_kw.min(battery.headroom_kw(soc)), 0.0),
                    (false, true) => {
                        // Never discharge more than the load and the export cap can take
                        let sink_kw = (net + battery.export_cap_kw).max(0.0);
                        let discharge_kw = battery
                            .max_discharge_kw
                            .min(battery.reserve_kw(soc))
                            .min(sink_kw);
                        (0.0, discharge_kw)
                    }
                    _ => (0.0, 0.0),
                };
            soc = step_soc(soc, charge_kw, discharge_kw, battery);
            soc_series.push(soc);
            HourPlan::settle(hour, net, charge_kw, discharge_kw, battery.export_cap_kw)
        })
        .collect();

    let schedule = Schedule::new(hours);
    let cost = schedule.cost(problem.prices(), battery.feed_in_fraction);
    SolvedDispatch {
        schedule,
        soc_series,
        cost,
    }
}
