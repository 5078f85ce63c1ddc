use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    /// Whether the MILP backend can be acquired; when false every `milp` request
    /// is served by the heuristic fallback
    exact_available: bool,
}

/// GET /api/v1/healthz
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let exact_available = state.orchestrator.exact_available();
    Json(HealthResponse {
        status: if exact_available { "healthy" } else { "degraded" },
        exact_available,
    })
}
