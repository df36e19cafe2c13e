//! HTTP error mapping
//!
//! Every failure leaves the daemon as the same JSON shape:
//! `{timestamp, status, error, message, path, errors?}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use flight_common::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Standard error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input data")]
    Validation(#[from] ValidationError),

    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("the requested resource was not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedJson(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the request path for the response body
    pub fn at(self, path: impl Into<String>) -> ApiFailure {
        ApiFailure {
            error: self,
            path: path.into(),
        }
    }
}

/// An [`ApiError`] bound to the path that produced it
#[derive(Debug)]
pub struct ApiFailure {
    pub error: ApiError,
    pub path: String,
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = self.error.status();

        let (message, errors) = match &self.error {
            ApiError::Validation(v) => {
                warn!("Validation failed on {}: {}", self.path, v);
                (
                    "invalid input data".to_string(),
                    v.errors().iter().map(|e| e.to_string()).collect(),
                )
            }
            ApiError::MalformedJson(detail) => {
                warn!("Malformed JSON on {}: {}", self.path, detail);
                (
                    "malformed JSON; check that dates and numbers are valid".to_string(),
                    Vec::new(),
                )
            }
            ApiError::Internal(detail) => {
                // Detail stays in the log
                error!("Unexpected error on {}: {}", self.path, detail);
                ("an unexpected internal error occurred".to_string(), Vec::new())
            }
            other => (other.to_string(), Vec::new()),
        };

        let body = ErrorResponse {
            timestamp: chrono::Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            path: self.path,
            errors,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = self.error {
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flight_common::FieldError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation(ValidationError(vec![])).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RateLimited { retry_after: Duration::from_secs(3) }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }
        .at("/api/v1/predict")
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_validation_response_status() {
        let err = ValidationError(vec![FieldError::new("origin", "must not be blank")]);
        let response = ApiError::from(err).at("/api/v1/predict").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
