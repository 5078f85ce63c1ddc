use serde::{Deserialize, Serialize};

/// Resolved battery specification used by every backend for one solve.
///
/// State of charge is a fraction of `capacity_kwh`. One schedule step is one hour, so a
/// power in kW held for a step moves `power / capacity_kwh` of SoC before efficiency losses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatterySpec {
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub soc_min: f64,
    pub soc_max: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub export_cap_kw: f64,
    /// Fraction of the retail price credited for exported energy
    pub feed_in_fraction: f64,
    pub capacity_kwh: f64,
    pub initial_soc: f64,
}

impl Default for BatterySpec {
    fn default() -> Self {
        Self {
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
            soc_min: 0.1,
            soc_max: 1.0,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
            export_cap_kw: 5.0,
            feed_in_fraction: 0.10,
            capacity_kwh: 10.0,
            initial_soc: 0.5,
        }
    }
}

impl BatterySpec {
    /// Apply caller overrides on top of `self`, which acts as the defaults
    pub fn with_overrides(&self, overrides: &BatteryConstraints) -> Self {
        Self {
            max_charge_kw: overrides.max_charge_kw.unwrap_or(self.max_charge_kw),
            max_discharge_kw: overrides.max_discharge_kw.unwrap_or(self.max_discharge_kw),
            soc_min: overrides.soc_min.unwrap_or(self.soc_min),
            soc_max: overrides.soc_max.unwrap_or(self.soc_max),
            charge_efficiency: overrides.charge_efficiency.unwrap_or(self.charge_efficiency),
            discharge_efficiency: overrides
                .discharge_efficiency
                .unwrap_or(self.discharge_efficiency),
            export_cap_kw: overrides.export_cap_kw.unwrap_or(self.export_cap_kw),
            feed_in_fraction: overrides.feed_in_fraction.unwrap_or(self.feed_in_fraction),
            capacity_kwh: overrides.capacity_kwh.unwrap_or(self.capacity_kwh),
            initial_soc: overrides.initial_soc.unwrap_or(self.initial_soc),
        }
    }

    /// SoC gained by charging at `charge_kw` for one step
    pub fn soc_gain(&self, charge_kw: f64) -> f64 {
        charge_kw * self.charge_efficiency / self.capacity_kwh
    }

    /// SoC lost by discharging at `discharge_kw` for one step
    pub fn soc_loss(&self, discharge_kw: f64) -> f64 {
        discharge_kw / self.discharge_efficiency / self.capacity_kwh
    }

    /// Largest charge power that keeps SoC at or below `soc_max`
    pub fn headroom_kw(&self, soc: f64) -> f64 {
        ((self.soc_max - soc).max(0.0) * self.capacity_kwh / self.charge_efficiency).max(0.0)
    }

    /// Largest discharge power that keeps SoC at or above `soc_min`
    pub fn reserve_kw(&self, soc: f64) -> f64 {
        ((soc - self.soc_min).max(0.0) * self.capacity_kwh * self.discharge_efficiency).max(0.0)
    }
}

/// Optional per-request battery constraints, as received from the caller.
///
/// Field names follow the wire format of the dispatch request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryConstraints {
    #[serde(rename = "P_ch_max", default, skip_serializing_if = "Option::is_none")]
    pub max_charge_kw: Option<f64>,
    #[serde(rename = "P_dis_max", default, skip_serializing_if = "Option::is_none")]
    pub max_discharge_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_max: Option<f64>,
    #[serde(rename = "eta_ch", default, skip_serializing_if = "Option::is_none")]
    pub charge_efficiency: Option<f64>,
    #[serde(rename = "eta_dis", default, skip_serializing_if = "Option::is_none")]
    pub discharge_efficiency: Option<f64>,
    #[serde(rename = "export_cap", default, skip_serializing_if = "Option::is_none")]
    pub export_cap_kw: Option<f64>,
    #[serde(rename = "fit_fraction", default, skip_serializing_if = "Option::is_none")]
    pub feed_in_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_soc: Option<f64>,
}
