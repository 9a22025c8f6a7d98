use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use trivia_types::api::ErrorBody;

/// What every unclassified failure looks like to the client.
pub const GENERIC_FAILURE: &str = "An unexpected error occurred. Please try again.";

/// Request-scoped failure. Built where the failure happens, rendered only at
/// the response boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    /// A row the schema guarantees is missing or inconsistent.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// The data service (or the blocking pool running it) failed.
    #[error("{context}: {cause:#}")]
    Store {
        context: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn store(context: &'static str, cause: anyhow::Error) -> Self {
        Self::Store { context, cause }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DataIntegrity(_) | Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client. Internal failures never carry
    /// their cause out.
    pub fn public_message(&self) -> String {
        match self {
            Self::DataIntegrity(_) | Self::Store { .. } => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::DataIntegrity(_) | Self::Store { .. }) {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// Extractor rejections are client input errors. The framework's own text
// names serde internals, so it only goes to the debug log.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::invalid("Expected a JSON request body.")
            }
            _ => Self::invalid("Invalid request body."),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        Self::invalid("Invalid query parameters.")
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::invalid("Request body is too large.")
        } else {
            Self::invalid("Could not read request body.")
        }
    }
}

/// Attach an operation name to a data-service failure.
pub trait StoreResultExt<T> {
    fn or_store(self, context: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for anyhow::Result<T> {
    fn or_store(self, context: &'static str) -> Result<T, ApiError> {
        self.map_err(|cause| ApiError::store(context, cause))
    }
}

/// Run store work on the blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::store("spawn_blocking join", e.into()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_failures_hide_their_cause() {
        let err = ApiError::store("update metrics", anyhow::anyhow!("disk I/O error at page 7"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), GENERIC_FAILURE);
        assert!(err.to_string().contains("disk I/O error"));

        let err = ApiError::DataIntegrity("no metrics row for user u1".into());
        assert_eq!(err.public_message(), GENERIC_FAILURE);
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError::conflict("You have already answered this question.");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "You have already answered this question.");

        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidState("Request is not pending.".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::forbidden("no").status(), StatusCode::FORBIDDEN);
    }
}
