//! HTTP surface for the application error taxonomy. Every service
//! error crosses this boundary exactly once, so the status mapping
//! lives here and nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use bookflow_core::errors::{ApplicationError, DomainError, ErrorKind};
use bookflow_db::repositories::RepositoryError;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub ApplicationError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error)
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(ApplicationError::Domain(error))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self(ApplicationError::Persistence(error.to_string()))
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Conflict => "conflict",
        ErrorKind::StateTransition => "state_transition",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Integrity => "integrity",
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        // Persistence faults are transient and retriable, unlike the
        // integrity class they otherwise share.
        if matches!(self.0, ApplicationError::Persistence(_)) {
            return StatusCode::SERVICE_UNAVAILABLE;
        }
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict | ErrorKind::StateTransition => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(event_name = "api.error", status = %status, error = %self.0, "request failed");
        } else {
            warn!(event_name = "api.error", status = %status, error = %self.0, "request rejected");
        }
        let body = ErrorBody { error: self.0.to_string(), kind: kind_label(self.0.kind()) };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};

    use bookflow_core::errors::{ApplicationError, DomainError};

    use super::ApiError;

    #[test]
    fn validation_maps_to_unprocessable_entity() {
        let error = ApiError::from(DomainError::MissingField("title"));
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflict_and_transition_map_to_conflict() {
        let start = Utc::now();
        let conflict = ApiError::from(DomainError::WindowUnavailable {
            resource: "Paint Shop".to_string(),
            start,
            end: start + Duration::hours(2),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let transition = ApiError::from(DomainError::StepNotReachable { from: 1, to: 3 });
        assert_eq!(transition.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_and_persistence_are_distinguished() {
        let missing = ApiError::from(ApplicationError::not_found("booking", "42"));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let down = ApiError::from(ApplicationError::Persistence("pool closed".to_string()));
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let corrupt = ApiError::from(DomainError::Integrity("duplicate step".to_string()));
        assert_eq!(corrupt.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
