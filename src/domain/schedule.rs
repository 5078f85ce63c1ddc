use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Dispatch decision for a single hour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourPlan {
    pub hour: usize,
    pub charge_kw: f64,
    pub discharge_kw: f64,
    pub import_kw: f64,
    pub export_kw: f64,
    /// PV surplus that could be neither stored nor exported
    #[serde(default, skip_serializing_if = "is_zero")]
    pub curtailed_kw: f64,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl HourPlan {
    /// Build the plan for an hour from a battery decision, settling the residual
    /// against the grid. Surplus beyond `export_cap_kw` is curtailed.
    pub fn settle(
        hour: usize,
        net_demand_kw: f64,
        charge_kw: f64,
        discharge_kw: f64,
        export_cap_kw: f64,
    ) -> Self {
        let residual = net_demand_kw + charge_kw - discharge_kw;
        let (import_kw, export_kw, curtailed_kw) = if residual >= 0.0 {
            (residual, 0.0, 0.0)
        } else {
            let surplus = -residual;
            let export_kw = surplus.min(export_cap_kw.max(0.0));
            (0.0, export_kw, surplus - export_kw)
        };

        Self {
            hour,
            charge_kw,
            discharge_kw,
            import_kw,
            export_kw,
            curtailed_kw,
        }
    }

    /// Difference between supply and demand sides of the hour's balance
    pub fn balance_error(&self, pv_kw: f64, load_kw: f64) -> f64 {
        (self.import_kw + pv_kw - self.curtailed_kw + self.discharge_kw)
            - (load_kw + self.charge_kw + self.export_kw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    pub hours: Vec<HourPlan>,
}

impl Schedule {
    pub fn new(hours: Vec<HourPlan>) -> Self {
        Self { hours }
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// Import cost minus export revenue at the given feed-in fraction
    pub fn cost(&self, prices: &[f64], feed_in_fraction: f64) -> f64 {
        self.hours
            .iter()
            .zip(prices)
            .map(|(h, price)| price * h.import_kw - feed_in_fraction * price * h.export_kw)
            .sum()
    }
}

/// Backend that actually produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum SolverBackend {
    #[serde(rename = "milp")]
    #[strum(serialize = "milp")]
    Exact,
    #[serde(rename = "anneal")]
    #[strum(serialize = "anneal")]
    Anneal,
    #[serde(rename = "qaoa")]
    #[strum(serialize = "qaoa")]
    Variational,
    /// Randomized local search standing in for an unavailable sampler
    #[serde(rename = "local-search")]
    #[strum(serialize = "local-search")]
    LocalSearch,
    #[serde(rename = "heuristic")]
    #[strum(serialize = "heuristic")]
    Heuristic,
    #[serde(rename = "heuristic-fallback")]
    #[strum(serialize = "heuristic-fallback")]
    HeuristicFallback,
}

impl SolverBackend {
    pub fn is_fallback(&self) -> bool {
        matches!(self, SolverBackend::HeuristicFallback | SolverBackend::LocalSearch)
    }
}

/// Raw sampler output carried alongside a translated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub bitstring: String,
    pub energy: f64,
}

/// Normalized result of one dispatch solve, whichever backend ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionResult {
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soc_series: Option<Vec<f64>>,
    pub cost: f64,
    pub solver: SolverBackend,
    pub feasible: bool,
    #[serde(flatten)]
    pub sample: Option<SampleSummary>,
}
