use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{error::AppError, protocol::ErrorBody, utils::request_limits::RequestValidationError};
use serde::Serialize;
use thiserror::Error;

const UPSTREAM_MESSAGE: &str = "The Google Cloud service request failed. Check the server logs for details.";

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Project id or Google credentials are missing or rejected.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::Credentials(msg) => Self::Unavailable(msg),
            err if err.is_upstream() => {
                tracing::error!("Upstream error: {:?}", err);
                Self::Upstream(UPSTREAM_MESSAGE.to_string())
            }
            err => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        match err {
            RequestValidationError::PayloadTooLarge(msg) => Self::PayloadTooLarge(msg),
            RequestValidationError::BadRequest(msg) => Self::ValidationError(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::ValidationError(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            Self::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Upstream(message) => (StatusCode::BAD_GATEWAY, message),
        };

        (
            status,
            Json(ErrorBody {
                detail,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let not_found = AppError::NotFound("resource not found".to_string());
        let api_error = ApiError::from(not_found);
        assert!(matches!(api_error, ApiError::NotFound(msg) if msg == "resource not found"));

        let validation = AppError::Validation("invalid input".to_string());
        let api_error = ApiError::from(validation);
        assert!(matches!(api_error, ApiError::ValidationError(msg) if msg == "invalid input"));

        let credentials = AppError::Credentials("set PROJECT_ID".to_string());
        let api_error = ApiError::from(credentials);
        assert!(matches!(api_error, ApiError::Unavailable(msg) if msg == "set PROJECT_ID"));

        let internal_error = AppError::Io(std::io::Error::other("io error"));
        let api_error = ApiError::from(internal_error);
        assert!(matches!(api_error, ApiError::InternalError(_)));
    }

    #[test]
    fn test_upstream_details_are_not_leaked() {
        let upstream = AppError::Upstream("403 PERMISSION_DENIED on projects/secret".to_string());
        let api_error = ApiError::from(upstream);

        assert!(matches!(&api_error, ApiError::Upstream(msg) if !msg.contains("secret")));
        assert_status_code(api_error, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_request_validation_conversion() {
        let too_large = RequestValidationError::PayloadTooLarge("too big".to_string());
        assert_status_code(ApiError::from(too_large), StatusCode::PAYLOAD_TOO_LARGE);

        let bad = RequestValidationError::BadRequest("Unsupported file type: .png".to_string());
        assert!(matches!(ApiError::from(bad), ApiError::ValidationError(msg) if msg.contains(".png")));
    }

    #[test]
    fn test_api_error_response_status_codes() {
        assert_status_code(
            ApiError::InternalError("server error".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::NotFound("not found".to_string()),
            StatusCode::NOT_FOUND,
        );
        assert_status_code(
            ApiError::ValidationError("invalid input".to_string()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::Unavailable("no credentials".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
    }

    #[test]
    fn test_error_messages() {
        let error = ApiError::ValidationError("top_k must be at least 1".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: top_k must be at least 1"
        );

        let error = ApiError::NotFound("document abc".to_string());
        assert_eq!(error.to_string(), "Not found: document abc");
    }

    #[test]
    fn test_internal_error_sanitization() {
        let api_error = ApiError::InternalError("token file unreadable".to_string());

        assert_eq!(api_error.to_string(), "Internal server error");
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
