use thiserror::Error;

/// Failure modes of a dispatch solve.
///
/// Only `InvalidInput` and `InvalidBackend` reach the caller; the orchestrator absorbs the
/// other two by falling back to the heuristic controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),

    #[error("Infeasible: {0}")]
    Infeasible(String),

    #[error("Unknown solver: {0}")]
    InvalidBackend(String),
}

impl DispatchError {
    /// Whether the orchestrator reroutes this failure to the fallback chain
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DispatchError::SolverUnavailable(_) | DispatchError::Infeasible(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidInput(_) => "InvalidInput",
            DispatchError::SolverUnavailable(_) => "SolverUnavailable",
            DispatchError::Infeasible(_) => "Infeasible",
            DispatchError::InvalidBackend(_) => "InvalidBackend",
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
