pub mod error;
pub mod greedy;
pub mod orchestrator;
pub mod problem;
pub mod qubo;
pub mod sampler;
pub mod strategies;
pub mod types;

pub use error::*;
pub use greedy::HeuristicSolver;
pub use orchestrator::{DispatchOrchestrator, DispatchRequest};
pub use problem::*;
pub use qubo::{Qubo, QuboBuilder, QuboVariable, Role};
pub use strategies::*;
pub use types::*;
