use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the whole service.
///
/// Every operation returns one of these; the `ResponseError` impl maps each
/// category to a status code and a `{"message": ...}` JSON body so handlers
/// can propagate with `?` and never build error responses by hand.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input (bad duration, future date, short reason).
    #[error("{0}")]
    Validation(String),

    /// Duplicate entry/exit for a date, taken username, and similar collisions.
    #[error("{0}")]
    Conflict(String),

    /// Missing employee, department, shift or attendance record.
    #[error("{0}")]
    NotFound(String),

    /// Insufficient privilege for the requested operation.
    #[error("{0}")]
    Permission(String),

    /// Operation not valid in the record's current state (exit without entry,
    /// correction outside the allowed window).
    #[error("{0}")]
    State(String),

    /// Store failure. The underlying error is logged, never sent to callers.
    #[error("Internal Server Error")]
    Store(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::State(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Store(e) = self {
            tracing::error!(error = %e, "Store operation failed");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = ApiError::Validation("Cannot mark attendance for future dates".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Cannot mark attendance for future dates");
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = ApiError::Conflict("Entry already marked for this date".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn state_maps_to_422() {
        let err = ApiError::State("No check-in found. Mark entry first.".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn store_error_hides_details() {
        let err = ApiError::Store(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn propagates_with_question_mark() {
        fn inner() -> ApiResult<()> {
            Err(ApiError::Permission("Admin only".into()))
        }
        fn outer() -> ApiResult<()> {
            inner()?;
            Ok(())
        }
        assert!(outer().is_err());
    }
}
