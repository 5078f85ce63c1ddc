//! Dispatch problem formulation
//!
//! Turns raw hourly series and a battery specification into the normalized inputs shared by
//! every backend: per-hour net demand, the mean price and validated bounds. No solving here.

use itertools::Itertools;
use serde::Serialize;

use super::{DispatchError, DispatchResult};
use crate::domain::{BatterySpec, DispatchSeries};

#[derive(Debug, Clone, Serialize)]
pub struct DispatchProblem {
    pub series: DispatchSeries,
    pub battery: BatterySpec,
    /// load − pv per hour; negative values are PV surplus
    pub net_demand: Vec<f64>,
    pub average_price: f64,
}

impl DispatchProblem {
    pub fn formulate(series: DispatchSeries, battery: BatterySpec) -> DispatchResult<Self> {
        validate_series(&series)?;
        validate_battery(&battery)?;

        let net_demand = series
            .load
            .iter()
            .zip_eq(&series.pv)
            .map(|(load, pv)| load - pv)
            .collect();
        let average_price = series.prices.iter().sum::<f64>() / series.horizon() as f64;

        Ok(Self {
            series,
            battery,
            net_demand,
            average_price,
        })
    }

    pub fn horizon(&self) -> usize {
        self.series.horizon()
    }

    pub fn prices(&self) -> &[f64] {
        &self.series.prices
    }
}

fn validate_series(series: &DispatchSeries) -> DispatchResult<()> {
    let t = series.prices.len();
    if t == 0 {
        return Err(DispatchError::InvalidInput(
            "price series must contain at least one hour".to_string(),
        ));
    }
    if series.pv.len() != t || series.load.len() != t {
        return Err(DispatchError::InvalidInput(format!(
            "series length mismatch: prices={}, pv={}, load={}",
            t,
            series.pv.len(),
            series.load.len()
        )));
    }

    for (name, values) in [
        ("prices", &series.prices),
        ("pv", &series.pv),
        ("load", &series.load),
    ] {
        if let Some((hour, v)) = values.iter().find_position(|v| !v.is_finite()) {
            return Err(DispatchError::InvalidInput(format!(
                "{name}[{hour}] is not a finite number ({v})"
            )));
        }
    }
    for (name, values) in [("pv", &series.pv), ("load", &series.load)] {
        if let Some((hour, v)) = values.iter().find_position(|v| **v < 0.0) {
            return Err(DispatchError::InvalidInput(format!(
                "{name}[{hour}] must be non-negative, got {v}"
            )));
        }
    }
    Ok(())
}

fn validate_battery(b: &BatterySpec) -> DispatchResult<()> {
    let efficiency_ok = |eta: f64| eta > 0.0 && eta <= 1.0;
    if !efficiency_ok(b.charge_efficiency) {
        return Err(DispatchError::InvalidInput(format!(
            "charge efficiency must be in (0, 1], got {}",
            b.charge_efficiency
        )));
    }
    if !efficiency_ok(b.discharge_efficiency) {
        return Err(DispatchError::InvalidInput(format!(
            "discharge efficiency must be in (0, 1], got {}",
            b.discharge_efficiency
        )));
    }

    let fields = [
        ("P_ch_max", b.max_charge_kw),
        ("P_dis_max", b.max_discharge_kw),
        ("export_cap", b.export_cap_kw),
        ("fit_fraction", b.feed_in_fraction),
    ];
    if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
        return Err(DispatchError::InvalidInput(format!(
            "{name} must be a non-negative number, got {v}"
        )));
    }
    if !(b.capacity_kwh.is_finite() && b.capacity_kwh > 0.0) {
        return Err(DispatchError::InvalidInput(format!(
            "battery capacity must be positive, got {}",
            b.capacity_kwh
        )));
    }
    if !(0.0..=1.0).contains(&b.soc_min) || !(0.0..=1.0).contains(&b.soc_max) || b.soc_min > b.soc_max
    {
        return Err(DispatchError::InvalidInput(format!(
            "SoC bounds must satisfy 0 <= soc_min <= soc_max <= 1, got [{}, {}]",
            b.soc_min, b.soc_max
        )));
    }
    if !(b.soc_min..=b.soc_max).contains(&b.initial_soc) {
        return Err(DispatchError::InvalidInput(format!(
            "initial SoC {} outside [{}, {}]",
            b.initial_soc, b.soc_min, b.soc_max
        )));
    }
    Ok(())
}
