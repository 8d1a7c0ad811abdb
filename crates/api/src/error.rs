//! API error types with HTTP response mapping.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ErrorCategory, ServiceError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error reported by a domain service.
    Service(ServiceError),
}

impl ApiError {
    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) => category_status(err.category),
        }
    }
}

fn category_status(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) => (msg, BTreeMap::new()),
            ApiError::Service(err) => (err.message, err.details),
        };

        let body = serde_json::json!({ "error": message, "details": details });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let cases = [
            (ErrorCategory::Validation, StatusCode::BAD_REQUEST),
            (ErrorCategory::NotFound, StatusCode::NOT_FOUND),
            (ErrorCategory::Forbidden, StatusCode::FORBIDDEN),
            (ErrorCategory::Conflict, StatusCode::CONFLICT),
            (ErrorCategory::Storage, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (category, status) in cases {
            let err = ApiError::from(ServiceError::new(category, "boom"));
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_unauthorized() {
        let err = ApiError::Unauthorized("missing x-user-id header".into());
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
