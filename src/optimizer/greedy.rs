use tracing::debug;

use super::{Action, DispatchProblem, DispatchResult, OptimizationStrategy, SolvedDispatch};
use crate::domain::{BatterySpec, HourPlan, Schedule};

/// Simple greedy controller that follows basic rules:
/// - Charge from PV surplus when the price is below average
/// - Discharge into the load when the price is above average
/// - Hold otherwise
///
/// Runs in a single pass with no external dependency, so it is both the baseline and the
/// fallback for every other backend.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicSolver {
    /// Charge when price < average * charge_threshold
    pub charge_threshold: f64,
    /// Discharge when price > average * discharge_threshold
    pub discharge_threshold: f64,
}

impl Default for HeuristicSolver {
    fn default() -> Self {
        Self {
            charge_threshold: 1.0,
            discharge_threshold: 1.0,
        }
    }
}

impl HeuristicSolver {
    pub fn new(charge_threshold: f64, discharge_threshold: f64) -> Self {
        Self {
            charge_threshold,
            discharge_threshold,
        }
    }

    /// Pick the action and its power for one hour
    fn determine_power(
        &self,
        price: f64,
        avg_price: f64,
        net_demand_kw: f64,
        soc: f64,
        battery: &BatterySpec,
    ) -> (Action, f64, &'static str) {
        if price < avg_price * self.charge_threshold && soc < battery.soc_max && net_demand_kw < 0.0
        {
            let power = battery
                .max_charge_kw
                .min(-net_demand_kw)
                .min(battery.headroom_kw(soc));
            if power > 0.0 {
                return (Action::Charge, power, "cheap_surplus_charge");
            }
        }

        if price > avg_price * self.discharge_threshold && soc > battery.soc_min && net_demand_kw > 0.0
        {
            let power = battery
                .max_discharge_kw
                .min(net_demand_kw)
                .min(battery.reserve_kw(soc));
            if power > 0.0 {
                return (Action::Discharge, power, "high_price_discharge");
            }
        }

        (Action::Idle, 0.0, "hold")
    }

    pub fn solve(&self, problem: &DispatchProblem) -> SolvedDispatch {
        let battery = &problem.battery;
        let mut soc = battery.initial_soc;
        let mut soc_series = Vec::with_capacity(problem.horizon() + 1);
        soc_series.push(soc);

        let mut hours = Vec::with_capacity(problem.horizon());
        for (hour, (&price, &net)) in problem.prices().iter().zip(&problem.net_demand).enumerate() {
            let (action, power, reason) =
                self.determine_power(price, problem.average_price, net, soc, battery);

            let (charge_kw, discharge_kw) = match action {
                Action::Charge => (power, 0.0),
                Action::Discharge => (0.0, power),
                Action::Idle => (0.0, 0.0),
            };
            soc = step_soc(soc, charge_kw, discharge_kw, battery);
            soc_series.push(soc);

            debug!(hour, price, net, soc, reason, "heuristic step");
            hours.push(HourPlan::settle(hour, net, charge_kw, discharge_kw, battery.export_cap_kw));
        }

        let schedule = Schedule::new(hours);
        let cost = schedule.cost(problem.prices(), battery.feed_in_fraction);
        SolvedDispatch {
            schedule,
            soc_series,
            cost,
        }
    }
}

impl OptimizationStrategy for HeuristicSolver {
    fn optimize(&self, problem: &DispatchProblem) -> DispatchResult<SolvedDispatch> {
        Ok(self.solve(problem))
    }
}

/// Advance SoC by one hour. The clamp only absorbs floating-point drift; callers size
/// power against headroom/reserve so the bounds already hold.
pub(crate) fn step_soc(soc: f64, charge_kw: f64, discharge_kw: f64, battery: &BatterySpec) -> f64 {
    (soc + battery.soc_gain(charge_kw) - battery.soc_loss(discharge_kw))
        .clamp(battery.soc_min, battery.soc_max)
}
