use serde::{Deserialize, Serialize};

/// Hourly forecast inputs for one dispatch horizon.
///
/// All three series must have the same length; that is checked when the problem is
/// formulated, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSeries {
    /// Retail price per kWh for each hour
    pub prices: Vec<f64>,
    /// PV generation in kW for each hour
    pub pv: Vec<f64>,
    /// Household load in kW for each hour
    pub load: Vec<f64>,
}

impl DispatchSeries {
    pub fn new(prices: Vec<f64>, pv: Vec<f64>, load: Vec<f64>) -> Self {
        Self { prices, pv, load }
    }

    pub fn horizon(&self) -> usize {
        self.prices.len()
    }
}
