//! MILP (Mixed-Integer Linear Programming) Optimizer
//!
//! Exact strategy for the hourly dispatch problem. Per hour the model carries charge,
//! discharge, import and export power plus two binary indicators that keep charging and
//! discharging mutually exclusive. One SoC variable per hour boundary links the hours.
//!
//! The formulation considers:
//! - Per-hour power balance: import + pv + discharge = load + charge + export
//! - Charge/discharge power caps gated by the indicators
//! - SoC recursion with charge/discharge efficiency, in fractions of battery capacity
//! - Export cap
//! - Objective: import cost minus feed-in revenue
//!
//! The LP/MILP capability comes from `good_lp` behind the `optimization` feature. Without
//! it every solve reports `SolverUnavailable` and the orchestrator falls back.

use tracing::warn;

use crate::optimizer::{
    DispatchError, DispatchProblem, DispatchResult, OptimizationStrategy, SolvedDispatch,
};
#[cfg(feature = "optimization")]
use crate::domain::{HourPlan, Schedule};

/// Values below this are solver noise and are snapped to zero
#[cfg(feature = "optimization")]
const ZERO_TOLERANCE: f64 = 1e-9;

/// Exact optimizer backed by a MILP solver
#[derive(Debug, Clone, Copy)]
pub struct ExactSolver {
    available: bool,
}

impl Default for ExactSolver {
    fn default() -> Self {
        Self {
            available: cfg!(feature = "optimization"),
        }
    }
}

impl ExactSolver {
    /// An exact solver whose capability cannot be acquired; every solve fails with
    /// `SolverUnavailable`
    pub fn unavailable() -> Self {
        Self { available: false }
    }

    #[cfg(feature = "optimization")]
    fn solve_milp(&self, problem: &DispatchProblem) -> DispatchResult<SolvedDispatch> {
        self.solve_with_objective(problem).map(|(solved, _)| solved)
    }

    /// Solve and also return the model's own objective value
    #[cfg(feature = "optimization")]
    fn solve_with_objective(&self, problem: &DispatchProblem) -> DispatchResult<(SolvedDispatch, f64)> {
        use good_lp::*;

        let n_periods = problem.horizon();
        let battery = &problem.battery;
        let prices = problem.prices();
        let pv = &problem.series.pv;
        let load = &problem.series.load;
        let fit = battery.feed_in_fraction;

        if n_periods > 48 {
            warn!(
                n_periods,
                "MILP solver received a long horizon; solve time grows quickly with the binary count"
            );
        }

        let mut vars = ProblemVariables::new();

        // charge[t], discharge[t], import[t], export[t] in kW over a one-hour step
        // is_charging[t], is_discharging[t] binary
        // soc[t] fraction of capacity at hour boundary t, T+1 of them
        let charge = vars.add_vector(variable().min(0.0).max(battery.max_charge_kw), n_periods);
        let discharge =
            vars.add_vector(variable().min(0.0).max(battery.max_discharge_kw), n_periods);
        let import = vars.add_vector(variable().min(0.0), n_periods);
        let export = vars.add_vector(variable().min(0.0).max(battery.export_cap_kw), n_periods);
        let is_charging = vars.add_vector(variable().binary(), n_periods);
        let is_discharging = vars.add_vector(variable().binary(), n_periods);
        let soc = vars.add_vector(
            variable().min(battery.soc_min).max(battery.soc_max),
            n_periods + 1,
        );

        let objective: Expression = (0..n_periods)
            .map(|t| prices[t] * import[t] - fit * prices[t] * export[t])
            .sum();

        let mut model = vars.minimise(objective.clone()).using(default_solver);

        model = model.with(constraint!(soc[0] == battery.initial_soc));

        let charge_gain = battery.charge_efficiency / battery.capacity_kwh;
        let discharge_loss = 1.0 / (battery.discharge_efficiency * battery.capacity_kwh);

        for t in 0..n_periods {
            let pv_t = pv[t];
            let load_t = load[t];

            // Power balance
            model = model.with(constraint!(
                import[t] + pv_t + discharge[t] == load_t + charge[t] + export[t]
            ));

            // No simultaneous charge and discharge
            model = model.with(constraint!(is_charging[t] + is_discharging[t] <= 1));
            model = model.with(constraint!(
                charge[t] <= battery.max_charge_kw * is_charging[t]
            ));
            model = model.with(constraint!(
                discharge[t] <= battery.max_discharge_kw * is_discharging[t]
            ));

            // SoC dynamics
            model = model.with(constraint!(
                soc[t + 1] == soc[t] + charge_gain * charge[t] - discharge_loss * discharge[t]
            ));
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => {
                DispatchError::Infeasible(format!("MILP returned no optimum: {e}"))
            }
            other => DispatchError::SolverUnavailable(format!("MILP solver failed: {other}")),
        })?;

        let snap = |v: f64| if v.abs() < ZERO_TOLERANCE { 0.0 } else { v.max(0.0) };

        let hours: Vec<HourPlan> = (0..n_periods)
            .map(|t| {
                let charging = solution.value(is_charging[t]) > 0.5;
                let discharging = solution.value(is_discharging[t]) > 0.5;
                HourPlan {
                    hour: t,
                    charge_kw: if charging { snap(solution.value(charge[t])) } else { 0.0 },
                    discharge_kw: if discharging {
                        snap(solution.value(discharge[t]))
                    } else {
                        0.0
                    },
                    import_kw: snap(solution.value(import[t])),
                    export_kw: snap(solution.value(export[t])),
                    curtailed_kw: 0.0,
                }
            })
            .collect();
        let soc_series = (0..=n_periods)
            .map(|t| solution.value(soc[t]).clamp(battery.soc_min, battery.soc_max))
            .collect();

        let schedule = Schedule::new(hours);
        let cost = schedule.cost(prices, fit);
        let objective = solution.eval(&objective);
        tracing::debug!(objective, cost, n_periods, "MILP solved");

        Ok((
            SolvedDispatch {
                schedule,
                soc_series,
                cost,
            },
            objective,
        ))
    }

    #[cfg(not(feature = "optimization"))]
    fn solve_milp(&self, _problem: &DispatchProblem) -> DispatchResult<SolvedDispatch> {
        Err(DispatchError::SolverUnavailable(
            "MILP optimization requires the 'optimization' feature to be enabled".to_string(),
        ))
    }
}

impl OptimizationStrategy for ExactSolver {
    fn optimize(&self, problem: &DispatchProblem) -> DispatchResult<SolvedDispatch> {
        if !self.available {
            warn!("exact solver capability not available");
            return Err(DispatchError::SolverUnavailable(
                "LP/MILP capability could not be acquired".to_string(),
            ));
        }
        self.solve_milp(problem)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatterySpec, DispatchSeries};

    fn scenario(battery: BatterySpec) -> DispatchProblem {
        DispatchProblem::formulate(
            DispatchSeries::new(
                vec![0.30, 0.25, 0.50, 0.60],
                vec![0.0, 0.5, 1.2, 0.9],
                vec![0.6, 0.7, 0.8, 0.9],
            ),
            battery,
        )
        .unwrap()
    }

    #[test]
    fn test_unavailable_capability() {
        let err = ExactSolver::unavailable()
            .optimize(&scenario(BatterySpec::default()))
            .unwrap_err();
        assert!(matches!(err, DispatchError::SolverUnavailable(_)));
    }

    #[cfg(not(feature = "optimization"))]
    #[test]
    fn test_default_without_feature_is_unavailable() {
        assert!(!ExactSolver::default().is_available());
    }

    #[cfg(feature = "optimization")]
    mod with_solver {
        use super::*;
        use crate::optimizer::HeuristicSolver;
        use proptest::prelude::*;

        #[test]
        fn test_objective_matches_recomputed_cost() {
            let problem = scenario(BatterySpec::default());
            let (out, objective) = ExactSolver::default()
                .solve_with_objective(&problem)
                .unwrap();
            assert!(
                (objective - out.cost).abs() < 1e-6,
                "objective {objective} vs cost {}",
                out.cost
            );
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn prop_exact_invariants(
                rows in prop::collection::vec((0.0f64..1.0, 0.0f64..4.0, 0.0f64..4.0), 1..6)
            ) {
                let prices = rows.iter().map(|r| r.0).collect();
                let pv: Vec<f64> = rows.iter().map(|r| r.1).collect();
                let load: Vec<f64> = rows.iter().map(|r| r.2).collect();
                let problem = DispatchProblem::formulate(
                    DispatchSeries::new(prices, pv.clone(), load.clone()),
                    BatterySpec::default(),
                )
                .unwrap();
                let battery = problem.battery;
                // At most 4 kW of surplus always fits under the 5 kW export cap
                let (out, objective) = ExactSolver::default()
                    .solve_with_objective(&problem)
                    .unwrap();

                prop_assert!((objective - out.cost).abs() < 1e-6);
                prop_assert_eq!(out.soc_series.len(), rows.len() + 1);
                for soc in &out.soc_series {
                    prop_assert!(*soc >= battery.soc_min - 1e-9 && *soc <= battery.soc_max + 1e-9);
                }
                for (t, h) in out.schedule.hours.iter().enumerate() {
                    prop_assert_eq!(h.charge_kw * h.discharge_kw, 0.0);
                    prop_assert!(h.charge_kw <= battery.max_charge_kw + 1e-6);
                    prop_assert!(h.discharge_kw <= battery.max_discharge_kw + 1e-6);
                    prop_assert!(h.export_kw <= battery.export_cap_kw + 1e-6);
                    prop_assert!(h.balance_error(pv[t], load[t]).abs() < 1e-6);
                }
            }
        }

        #[test]
        fn test_milp_scenario_invariants() {
            let problem = scenario(BatterySpec::default());
            let battery = problem.battery;
            let out = ExactSolver::default().optimize(&problem).unwrap();

            assert_eq!(out.schedule.len(), 4);
            assert_eq!(out.soc_series.len(), 5);
            assert!((out.soc_series[0] - 0.5).abs() < 1e-6);
            assert!(out.cost.is_finite());

            for soc in &out.soc_series {
                assert!(*soc >= battery.soc_min - 1e-6 && *soc <= battery.soc_max + 1e-6);
            }
            for (t, h) in out.schedule.hours.iter().enumerate() {
                assert_eq!(h.charge_kw * h.discharge_kw, 0.0);
                assert!(h.import_kw >= 0.0 && h.export_kw >= 0.0);
                let err = h.balance_error(problem.series.pv[t], problem.series.load[t]);
                assert!(err.abs() < 1e-6, "hour {t} balance off by {err}");
            }
        }

        #[test]
        fn test_milp_not_worse_than_heuristic() {
            let problem = scenario(BatterySpec::default());
            let exact = ExactSolver::default().optimize(&problem).unwrap();
            let greedy = HeuristicSolver::default().solve(&problem);
            assert!(exact.cost <= greedy.cost + 1e-6);
        }

        #[test]
        fn test_milp_uses_stored_energy_at_peak() {
            let problem = DispatchProblem::formulate(
                DispatchSeries::new(vec![0.1, 1.0], vec![0.0, 0.0], vec![1.0, 1.0]),
                BatterySpec::default(),
            )
            .unwrap();
            let out = ExactSolver::default().optimize(&problem).unwrap();

            // 0.4 of 10 kWh above soc_min covers the peak hour without importing
            assert!(out.schedule.hours[1].import_kw < 1e-6);
            assert!(out.cost < 0.1 * 1.0 + 1.0 * 1.0);
        }

        #[test]
        fn test_unabsorbable_surplus_is_infeasible() {
            // 20 kW of PV, 5 kW charge cap and 5 kW export cap leave 10 kW nowhere to go
            let problem = DispatchProblem::formulate(
                DispatchSeries::new(vec![0.2], vec![20.0], vec![0.0]),
                BatterySpec::default(),
            )
            .unwrap();
            let err = ExactSolver::default().optimize(&problem).unwrap_err();
            assert!(matches!(err, DispatchError::Infeasible(_)));
        }
    }
}
