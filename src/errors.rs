use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every JSON endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "code": "validation_error",
    "message": "Validation error: email is required",
    "request_id": "req-abc123xyz",
    "timestamp": "2025-03-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Bad Gateway")
    pub error: String,
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    /// Required credentials or secrets are absent
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Signature mismatch on an inbound callback
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Callback amount disagrees with the stored checkout session
    #[error("Amount mismatch for {reference}: expected {expected}, received {received}")]
    AmountMismatch {
        reference: String,
        expected: i64,
        received: i64,
    },

    /// Provider unreachable or returned a failure payload
    #[error("Upstream provider error: {0}")]
    UpstreamError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Session was marked processed but the order could not be written
    #[error("Manual reconciliation required for {0}")]
    ReconciliationRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A unique key is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatus(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::UpstreamError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::BadRequest(_) | Self::InvalidStatus(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_)
            | Self::ConfigurationError(_)
            | Self::PersistenceError(_)
            | Self::ReconciliationRequired(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code clients and providers can match on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) | Self::PersistenceError(_) => "persistence_error",
            Self::ConfigurationError(_) => "configuration_error",
            Self::ValidationError(_) => "validation_error",
            Self::AuthenticationError(_) => "authentication_error",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::UpstreamError(_) => "upstream_error",
            Self::ReconciliationRequired(_) => "reconciliation_required",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::InvalidStatus(_) => "invalid_status",
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "internal_error"
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::PersistenceError(_) => "Database error".to_string(),
            Self::ConfigurationError(_) => "Payment provider is not configured".to_string(),
            Self::ReconciliationRequired(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::AmountMismatch { reference, .. } => {
                format!("Amount mismatch for {}", reference)
            }
            _ => self.to_string(),
        }
    }

    /// Maps unique-key violations to `Conflict`, everything else to `DatabaseError`.
    pub fn from_db(err: sea_orm::DbErr, context: &str) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::Conflict(context.to_string())
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Wraps a store failure that is not a sea-orm error.
    pub fn persistence(message: impl Into<String>) -> Self {
        ServiceError::PersistenceError(message.into())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, "not_found");
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::AuthenticationError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::ConfigurationError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::UpstreamError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::AmountMismatch {
                reference: "ABC".into(),
                expected: 100,
                received: 99
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::ReconciliationRequired("ABC".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::ConfigurationError("PAYTR merchant key missing".into())
                .response_message(),
            "Payment provider is not configured"
        );
        assert_eq!(
            ServiceError::persistence("disk full").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::UpstreamError("paytr: invalid basket".into()).response_message(),
            "Upstream provider error: paytr: invalid basket"
        );
    }
}
