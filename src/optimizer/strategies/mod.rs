//! Schedule-level optimization strategies
//!
//! - MILP: mixed-integer linear programming optimizer (exact solution)
//!
//! The greedy controller lives in `optimizer::greedy` and the QUBO samplers in
//! `optimizer::sampler`.

pub mod milp;

pub use milp::*;
