use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::booking::BookingStatus;

/// Recovery classes for callers that need to map errors onto a
/// transport (HTTP status, CLI exit code) without matching every
/// variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before persistence.
    Validation,
    /// The request was well-formed but collides with existing state
    /// (window unavailable, capacity exceeded). Retry with `suggest`.
    Conflict,
    /// The action is not legal from the entity's current state.
    StateTransition,
    /// Unknown entity id.
    NotFound,
    /// Corrupted configuration or data; not retriable.
    Integrity,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("booking window start {start} must be before end {end}")]
    InvalidWindow { start: DateTime<Utc>, end: DateTime<Utc> },
    #[error("required capacity must be at least 1, got {0}")]
    InvalidCapacity(i64),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown booking status `{0}`")]
    UnknownStatus(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("requested window {start}..{end} is not available for resource `{resource}`")]
    WindowUnavailable { resource: String, start: DateTime<Utc>, end: DateTime<Utc> },
    #[error("invalid booking transition from {from:?} to {to:?}")]
    InvalidBookingTransition { from: BookingStatus, to: BookingStatus },
    #[error("resource {0} is not active")]
    ResourceInactive(i64),
    #[error("no workflow transition from step {from} to step {to}")]
    StepNotReachable { from: i64, to: i64 },
    #[error("integrity violation: {0}")]
    Integrity(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWindow { .. }
            | Self::InvalidCapacity(_)
            | Self::MissingField(_)
            | Self::UnknownStatus(_)
            | Self::InvalidConfig(_)
            | Self::ResourceInactive(_) => ErrorKind::Validation,
            Self::WindowUnavailable { .. } => ErrorKind::Conflict,
            Self::InvalidBookingTransition { .. } | Self::StepNotReachable { .. } => {
                ErrorKind::StateTransition
            }
            Self::Integrity(_) => ErrorKind::Integrity,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{what} not found: `{key}`")]
    NotFound { what: &'static str, key: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

impl ApplicationError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { what, key: key.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(domain) => domain.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            // Persistence/integration faults are surfaced like integrity
            // problems: the caller cannot fix them by editing the request.
            Self::Persistence(_) | Self::Integration(_) => ErrorKind::Integrity,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ApplicationError, DomainError, ErrorKind};
    use crate::domain::booking::BookingStatus;

    #[test]
    fn validation_errors_classify_as_validation() {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();

        assert_eq!(DomainError::InvalidWindow { start, end }.kind(), ErrorKind::Validation);
        assert_eq!(DomainError::InvalidCapacity(0).kind(), ErrorKind::Validation);
        assert_eq!(DomainError::MissingField("title").kind(), ErrorKind::Validation);
        assert_eq!(
            DomainError::InvalidConfig("no working days".to_string()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn conflict_and_transition_errors_are_distinguished() {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();

        let conflict =
            DomainError::WindowUnavailable { resource: "Paint Shop".to_string(), start, end };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let transition = DomainError::InvalidBookingTransition {
            from: BookingStatus::Completed,
            to: BookingStatus::Cancelled,
        };
        assert_eq!(transition.kind(), ErrorKind::StateTransition);
    }

    #[test]
    fn application_error_kind_delegates_to_domain() {
        let error = ApplicationError::from(DomainError::Integrity(
            "transition target belongs to another workflow".to_string(),
        ));
        assert_eq!(error.kind(), ErrorKind::Integrity);

        let missing = ApplicationError::not_found("resource", "42");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.to_string(), "resource not found: `42`");
    }
}
