use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::datastore::DatastoreError, services::mailer::MailError,
    state::state_machine::InvalidTransition,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No identity accompanied the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Referenced row is missing or its constraints are not met.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller is not allowed to perform the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The email provider rejected a send.
    #[error("email dispatch failed")]
    Dispatch(#[source] MailError),
    /// A bounded resource could not be allocated right now.
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
}

impl From<DatastoreError> for ServiceError {
    fn from(err: DatastoreError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(format!("game is {:?}", err.from).to_lowercase())
    }
}

impl From<MailError> for ServiceError {
    fn from(err: MailError) -> Self {
        ServiceError::Dispatch(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Identity known but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// An upstream provider failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::PermissionDenied(message) => AppError::Forbidden(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Dispatch(source) => AppError::BadGateway(source.to_string()),
            ServiceError::Unavailable(message) => AppError::ServiceUnavailable(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::state_machine::{GameEvent, GameStatus};

    #[test]
    fn service_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::Dispatch(MailError::Rejected {
                    status: 422,
                    body: "bad".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (ServiceError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn invalid_transition_reads_as_invalid_state() {
        let err = ServiceError::from(InvalidTransition {
            from: GameStatus::Active,
            event: GameEvent::Start {
                at: SystemTime::now(),
                deadline_at: SystemTime::now(),
            },
        });
        assert!(matches!(err, ServiceError::InvalidState(message) if message == "game is active"));
    }
}
