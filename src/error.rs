use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::handlers::shared::ApiResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session is not open for RSVPs")]
    SessionNotOpen,

    #[error("RSVP deadline has passed")]
    DeadlinePassed,

    #[error("Cannot change an IN RSVP after the deadline")]
    LockedIn,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error{}", .0.as_ref().map_or("".to_string(), |s| format!(": {}", s)))]
    InternalServerError(Option<String>),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn internal_server_error_message(message: impl Into<String>) -> Self {
        AppError::InternalServerError(Some(message.into()))
    }

    /// Business-rule rejections that callers should surface verbatim and never retry.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            AppError::SessionNotOpen | AppError::DeadlinePassed | AppError::LockedIn
        )
    }

    /// Storage or provider failures the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::DatabaseError(_) | AppError::Dependency(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionNotOpen | AppError::DeadlinePassed | AppError::LockedIn => {
                StatusCode::CONFLICT
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::Dependency(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Configuration(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        if self.is_transient() {
            log::warn!("Request failed on a dependency ({}): {}", status_code, error_message);
        } else if status_code.is_server_error() {
            log::error!(
                "Request failed with status {}: {}",
                status_code,
                error_message
            );
        } else if self.is_policy() {
            log::info!("Request refused by RSVP policy: {}", error_message);
        } else {
            log::debug!("Request rejected with status {}: {}", status_code, error_message);
        }

        HttpResponse::build(status_code).json(ApiResponse::<()>::error(&error_message))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        log::error!("Database error: {}", error);
        AppError::DatabaseError(error)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        log::error!("Migration error: {}", error);
        AppError::Configuration(format!("migrations failed: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        log::error!("Anyhow error: {}", error);

        match error.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => AppError::DatabaseError(sqlx_err),
            Err(original_error) => AppError::InternalServerError(Some(original_error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn policy_errors_map_to_conflict() {
        for error in [
            AppError::SessionNotOpen,
            AppError::DeadlinePassed,
            AppError::LockedIn,
        ] {
            assert!(error.is_policy());
            assert!(!error.is_transient());
            assert_eq!(error.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn validation_and_lookup_statuses() {
        assert_eq!(
            AppError::validation("courts must be between 1 and 3").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("Session not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Dependency("push gateway timed out".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_error_message_formatting() {
        assert_eq!(
            AppError::InternalServerError(None).to_string(),
            "Internal server error"
        );
        assert_eq!(
            AppError::internal_server_error_message("boom").to_string(),
            "Internal server error: boom"
        );
    }
}
