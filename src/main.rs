use anyhow::Result;
use solar_dispatch::{api, config::Config, optimizer::DispatchOrchestrator, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;

    let orchestrator = DispatchOrchestrator::new(&cfg.solver, cfg.battery);
    if !orchestrator.exact_available() {
        warn!("built without the optimization feature; milp requests use the heuristic fallback");
    }

    let app = api::router(api::AppState::new(orchestrator), &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0 - service will be accessible from network");
    }

    info!(%addr, seed = ?cfg.solver.seed, "starting dispatch service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
