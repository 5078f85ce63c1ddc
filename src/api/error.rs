use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::optimizer::DispatchError;

/// Errors returned from handlers, carrying the backend the caller asked for
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error}")]
    Dispatch { error: DispatchError, solver: String },

    #[error("Validation error: {message}")]
    Validation { message: String, solver: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    solver: Option<String>,
}

impl ApiError {
    /// Faults the fallback chain should have absorbed surface as opaque internal errors
    pub fn dispatch(error: DispatchError, solver: impl Into<String>) -> Self {
        if error.is_recoverable() {
            return ApiError::Internal(error.to_string());
        }
        ApiError::Dispatch {
            error,
            solver: solver.into(),
        }
    }

    pub fn validation(errors: validator::ValidationErrors, solver: impl Into<String>) -> Self {
        ApiError::Validation {
            message: errors.to_string(),
            solver: solver.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Dispatch { error, .. } => match error {
                DispatchError::InvalidInput(_) | DispatchError::InvalidBackend(_) => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DispatchError::SolverUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::Internal(_) => {
                tracing::error!(error = %self, "API error occurred");
                ErrorResponse {
                    error: "An internal error occurred".to_string(),
                    solver: None,
                }
            }
            ApiError::Dispatch { solver, .. } | ApiError::Validation { solver, .. } => {
                if status.is_server_error() {
                    tracing::warn!(error = %self, solver = %solver, "dispatch failed");
                } else {
                    tracing::debug!(error = %self, solver = %solver, "client error");
                }
                ErrorResponse {
                    error: self.to_string(),
                    solver: Some(solver.clone()),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
