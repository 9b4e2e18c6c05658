// error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::commands::{ExecutorError, NoMatch};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device {0} not found")]
    DeviceNotFound(String),
    #[error("No devices available")]
    NoDevices,
    #[error(transparent)]
    CommandNotResolved(#[from] NoMatch),
    #[error("Command failed: {0}")]
    CommandFailed(#[from] ExecutorError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Update rejected: {0}")]
    UpdateRejected(String),
    #[error("Device not modified: {0}")]
    NotModified(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DeviceNotFound(_) | AppError::NoDevices => StatusCode::NOT_FOUND,
            AppError::CommandNotResolved(_)
            | AppError::CommandFailed(_)
            | AppError::Validation(_)
            | AppError::UpdateRejected(_) => StatusCode::EXPECTATION_FAILED,
            AppError::NotModified(_) => StatusCode::NOT_MODIFIED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            AppError::NoDevices => "NO_DEVICES",
            AppError::CommandNotResolved(_) => "COMMAND_NOT_RESOLVED",
            AppError::CommandFailed(_) => "COMMAND_FAILED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UpdateRejected(_) => "UPDATE_REJECTED",
            AppError::NotModified(_) => "NOT_MODIFIED",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 304 responses carry no body
        if status == StatusCode::NOT_MODIFIED {
            return status.into_response();
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::NoMatchReason;

    #[test]
    fn command_errors_are_expectation_failed() {
        let no_match = AppError::from(NoMatch {
            reason: NoMatchReason::NoShapeApplies,
        });
        let rejected = AppError::from(ExecutorError::UnknownDevice("lamp".into()));
        assert_eq!(no_match.status(), StatusCode::EXPECTATION_FAILED);
        assert_eq!(rejected.status(), StatusCode::EXPECTATION_FAILED);
    }

    #[test]
    fn empty_results_are_not_found() {
        assert_eq!(AppError::NoDevices.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::DeviceNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn registry_failures_map_to_not_modified() {
        let response = AppError::NotModified("store offline".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }
}
