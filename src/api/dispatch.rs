use std::time::Instant;

use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use super::{error::ApiError, AppState};
use crate::domain::{BatteryConstraints, DispatchSeries, SolutionResult};
use crate::optimizer::{DispatchRequest, RequestedSolver};

/// Body of `POST /api/v1/dispatch`
#[derive(Debug, Deserialize, Validate)]
pub struct DispatchBody {
    /// Capped at one year of hourly steps
    #[validate(length(max = 8760))]
    pub prices: Vec<f64>,
    #[validate(length(max = 8760))]
    pub pv: Vec<f64>,
    #[validate(length(max = 8760))]
    pub load: Vec<f64>,
    #[serde(default)]
    pub constraints: BatteryConstraints,
    #[serde(default = "default_solver")]
    pub solver: String,
}

fn default_solver() -> String {
    RequestedSolver::Milp.to_string()
}

impl From<DispatchBody> for DispatchRequest {
    fn from(body: DispatchBody) -> Self {
        DispatchRequest {
            series: DispatchSeries::new(body.prices, body.pv, body.load),
            constraints: body.constraints,
            solver: body.solver,
        }
    }
}

/// Just the backend name, read leniently so malformed bodies still report it
#[derive(Debug, Deserialize)]
struct RequestedBackend {
    #[serde(default = "default_solver")]
    solver: String,
}

/// Decode the body, mapping extractor failures to `{error, solver}` responses
fn parse_body(bytes: &[u8]) -> Result<DispatchBody, ApiError> {
    Json::<DispatchBody>::from_bytes(bytes)
        .map(|Json(body)| body)
        .map_err(|rejection| {
            let solver = Json::<RequestedBackend>::from_bytes(bytes)
                .map(|Json(requested)| requested.solver)
                .unwrap_or_else(|_| default_solver());
            ApiError::Validation {
                message: rejection.body_text(),
                solver,
            }
        })
}

/// POST /api/v1/dispatch - Produce a dispatch schedule
pub async fn dispatch(
    State(state): State<AppState>,
    bytes: Bytes,
) -> Result<Json<SolutionResult>, ApiError> {
    let body = parse_body(&bytes)?;
    let solver = body.solver.clone();
    body.validate()
        .map_err(|e| ApiError::validation(e, solver.clone()))?;

    let started = Instant::now();
    let result = state
        .orchestrator
        .dispatch(body.into())
        .await
        .map_err(|e| ApiError::dispatch(e, solver.clone()))?;

    tracing::debug!(
        requested = %solver,
        solver = %result.solver,
        hours = result.schedule.len(),
        cost = result.cost,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dispatch served"
    );
    Ok(Json(result))
}
