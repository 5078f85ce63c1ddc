use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::BatterySpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub solver: SolverConfig,
    /// Defaults for battery fields a request leaves out
    pub battery: BatterySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub exact_timeout_ms: u64,
    pub sampling_timeout_ms: u64,
    /// Concurrent solves allowed on the MILP capability
    pub max_concurrent_exact: usize,
    pub anneal_reads: usize,
    pub anneal_sweeps: usize,
    pub local_search_restarts: usize,
    pub local_search_max_passes: usize,
    pub variational_layers: usize,
    pub variational_shots: usize,
    pub variational_max_variables: usize,
    /// Fixed seed for randomized backends; drawn per request when absent
    pub seed: Option<u64>,
    pub qubo_penalty: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            exact_timeout_ms: 10_000,
            sampling_timeout_ms: 5_000,
            max_concurrent_exact: 1,
            anneal_reads: 200,
            anneal_sweeps: 1_000,
            local_search_restarts: 32,
            local_search_max_passes: 1_000,
            variational_layers: 8,
            variational_shots: 64,
            variational_max_variables: 16,
            seed: None,
            qubo_penalty: crate::optimizer::qubo::DEFAULT_PENALTY,
        }
    }
}

impl SolverConfig {
    pub fn exact_timeout(&self) -> Duration {
        Duration::from_millis(self.exact_timeout_ms)
    }

    pub fn sampling_timeout(&self) -> Duration {
        Duration::from_millis(self.sampling_timeout_ms)
    }

    /// Internal annealing budget, kept below the outer sampling timeout so the annealer
    /// gives up and hands over to local search before the orchestrator abandons it
    pub fn anneal_budget(&self) -> Duration {
        self.sampling_timeout() * 4 / 5
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DISPATCH__").split("__"));
        Ok(figment.extract()?)
    }
}
