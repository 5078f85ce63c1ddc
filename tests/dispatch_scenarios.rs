//! End-to-end dispatch scenarios, through the orchestrator and through the HTTP router.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use solar_dispatch::{
    api::{self, AppState},
    config::{Config, SolverConfig},
    domain::{BatteryConstraints, BatterySpec, DispatchSeries, SolverBackend},
    optimizer::{
        DispatchError, DispatchOrchestrator, DispatchProblem, DispatchRequest, ExactSolver,
        QuboBuilder,
    },
};
use tower::ServiceExt;

const PRICES: [f64; 4] = [0.30, 0.25, 0.50, 0.60];
const PV: [f64; 4] = [0.0, 0.5, 1.2, 0.9];
const LOAD: [f64; 4] = [0.6, 0.7, 0.8, 0.9];

fn series() -> DispatchSeries {
    DispatchSeries::new(PRICES.to_vec(), PV.to_vec(), LOAD.to_vec())
}

fn request(solver: &str) -> DispatchRequest {
    DispatchRequest {
        series: series(),
        constraints: BatteryConstraints::default(),
        solver: solver.to_string(),
    }
}

fn seeded_config() -> SolverConfig {
    SolverConfig {
        seed: Some(11),
        anneal_reads: 20,
        anneal_sweeps: 200,
        ..Default::default()
    }
}

fn orchestrator() -> DispatchOrchestrator {
    DispatchOrchestrator::new(&seeded_config(), BatterySpec::default())
}

fn assert_schedule_invariants(soc: &[f64], spec: &BatterySpec) {
    assert_eq!(soc.len(), PRICES.len() + 1);
    assert!((soc[0] - spec.initial_soc).abs() < 1e-9);
    for value in soc {
        assert!(*value >= spec.soc_min - 1e-6 && *value <= spec.soc_max + 1e-6);
    }
}

#[cfg(feature = "optimization")]
#[tokio::test]
async fn milp_scenario_returns_full_horizon() {
    let result = orchestrator().dispatch(request("milp")).await.unwrap();

    assert_eq!(result.solver, SolverBackend::Exact);
    assert!(result.feasible);
    assert_eq!(result.schedule.len(), 4);
    assert!(result.cost.is_finite());
    let soc = result.soc_series.expect("exact path reports SoC");
    assert_schedule_invariants(&soc, &BatterySpec::default());
}

#[tokio::test]
async fn empty_prices_is_invalid_input() {
    let mut req = request("milp");
    req.series = DispatchSeries::new(vec![], vec![], vec![]);

    let err = orchestrator().dispatch(req).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_solver_is_rejected_without_fallback() {
    let err = orchestrator().dispatch(request("teleport")).await.unwrap_err();
    assert_eq!(err, DispatchError::InvalidBackend("teleport".to_string()));
}

#[tokio::test]
async fn missing_exact_capability_uses_heuristic_fallback() {
    let orchestrator = orchestrator().with_exact_strategy(Arc::new(ExactSolver::unavailable()));
    let result = orchestrator.dispatch(request("milp")).await.unwrap();

    assert_eq!(result.solver, SolverBackend::HeuristicFallback);
    assert!(result.feasible);
    assert_eq!(result.schedule.len(), 4);
    let spec = BatterySpec::default();
    let soc = result.soc_series.expect("fallback reports SoC");
    assert_schedule_invariants(&soc, &spec);
    for (hour, plan) in result.schedule.hours.iter().enumerate() {
        assert!(plan.charge_kw <= spec.max_charge_kw + 1e-9);
        assert!(plan.discharge_kw <= spec.max_discharge_kw + 1e-9);
        assert!(plan.charge_kw == 0.0 || plan.discharge_kw == 0.0);
        assert!(plan.balance_error(PV[hour], LOAD[hour]).abs() < 1e-9);
    }
}

#[tokio::test]
async fn anneal_energy_matches_rebuilt_qubo() {
    let result = orchestrator().dispatch(request("anneal")).await.unwrap();
    assert!(matches!(
        result.solver,
        SolverBackend::Anneal | SolverBackend::LocalSearch
    ));

    let sample = result.sample.expect("sampler result carries a bitstring");
    assert_eq!(sample.bitstring.len(), 8);
    let bits: Vec<bool> = sample.bitstring.chars().map(|c| c == '1').collect();

    let problem = DispatchProblem::formulate(series(), BatterySpec::default()).unwrap();
    let qubo = QuboBuilder::new(seeded_config().qubo_penalty)
        .build(&problem)
        .unwrap();
    assert!((qubo.energy(&bits) - sample.energy).abs() < 1e-9);
}

#[tokio::test]
async fn seeded_anneal_is_reproducible() {
    let first = orchestrator().dispatch(request("anneal")).await.unwrap();
    let second = orchestrator().dispatch(request("anneal")).await.unwrap();
    assert_eq!(first.sample, second.sample);
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn app() -> axum::Router {
    let cfg = Config::default();
    api::router(AppState::new(orchestrator()), &cfg)
}

#[tokio::test]
async fn http_heuristic_dispatch() {
    let (status, body) = post_json(
        app(),
        "/api/v1/dispatch",
        json!({"prices": PRICES, "pv": PV, "load": LOAD, "solver": "heuristic"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["solver"], "heuristic");
    assert_eq!(body["feasible"], true);
    assert_eq!(body["schedule"].as_array().unwrap().len(), 4);
    assert_eq!(body["soc_series"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn http_unknown_solver_is_bad_request() {
    let (status, body) = post_json(
        app(),
        "/api/v1/dispatch",
        json!({"prices": PRICES, "pv": PV, "load": LOAD, "solver": "teleport"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["solver"], "teleport");
    assert_eq!(body["error"], "Unknown solver: teleport");
}

#[tokio::test]
async fn http_length_mismatch_is_bad_request() {
    let (status, body) = post_json(
        app(),
        "/api/v1/dispatch",
        json!({"prices": [0.3, 0.4], "pv": [0.0], "load": [0.5, 0.5]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["solver"], "milp");
    assert!(body["error"].as_str().unwrap().starts_with("Invalid input"));
}

#[tokio::test]
async fn http_healthz_reports_exact_capability() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body["exact_available"],
        cfg!(feature = "optimization")
    );
}

#[tokio::test]
async fn http_malformed_series_is_bad_request() {
    let (status, body) = post_json(
        app(),
        "/api/v1/dispatch",
        json!({"prices": [null, 0.4], "pv": [0.0, 0.0], "load": [0.5, 0.5], "solver": "qaoa"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["solver"], "qaoa");
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));
}
