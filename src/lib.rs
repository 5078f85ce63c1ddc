//! Battery dispatch optimization engine.
//!
//! Schedules hour-by-hour battery charge and discharge against price, PV and load
//! forecasts. Three interchangeable backends (an exact MILP, a greedy controller and QUBO
//! samplers) sit behind [`optimizer::DispatchOrchestrator`], which always returns a usable
//! schedule unless the request itself is invalid.

pub mod api;
pub mod config;
pub mod domain;
pub mod optimizer;
pub mod telemetry;
