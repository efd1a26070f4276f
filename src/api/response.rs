//! The `ActionResult` envelope returned by every endpoint.

use crate::errors::{ActionStatus, Error};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Uniform response body: a status from the closed set plus optional payload,
/// human message and per-field errors.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<T> {
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl<T> ActionResult<T> {
    /// A successful result carrying `data`.
    pub const fn success(data: T) -> Self {
        Self {
            status: ActionStatus::Success,
            message: None,
            data: Some(data),
            errors: None,
        }
    }

    /// Attaches a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ActionResult<()> {
    /// A successful result without payload.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            message: Some(message.into()),
            data: None,
            errors: None,
        }
    }
}

/// Result type of every handler.
pub type ApiResult<T> = Result<ActionResult<T>, Error>;

/// HTTP status code reported alongside an [`ActionStatus`].
#[must_use]
pub const fn http_status(status: ActionStatus) -> StatusCode {
    match status {
        ActionStatus::Success => StatusCode::OK,
        ActionStatus::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        ActionStatus::Unauthorized => StatusCode::UNAUTHORIZED,
        ActionStatus::Forbidden => StatusCode::FORBIDDEN,
        ActionStatus::NotFound => StatusCode::NOT_FOUND,
        ActionStatus::Conflict => StatusCode::CONFLICT,
        ActionStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl<T: Serialize> IntoResponse for ActionResult<T> {
    fn into_response(self) -> Response {
        (http_status(self.status), Json(self)).into_response()
    }
}

impl From<&Error> for ActionResult<()> {
    fn from(err: &Error) -> Self {
        let status = err.status();
        let message = if status == ActionStatus::Error {
            // Internal details stay in the logs
            error!(error = %err, "action failed");
            "An internal error occurred".to_string()
        } else {
            err.to_string()
        };
        let errors = match err {
            Error::Validation { field, message } => {
                Some(BTreeMap::from([(field.clone(), message.clone())]))
            }
            _ => None,
        };
        Self {
            status,
            message: Some(message),
            data: None,
            errors,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        ActionResult::from(&self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_body() {
        let body = ActionResult::from(&Error::validation("email", "is not a valid email"));
        assert_eq!(body.status, ActionStatus::ValidationError);
        assert_eq!(
            body.errors.and_then(|e| e.get("email").cloned()).as_deref(),
            Some("is not a valid email")
        );
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = Error::Config {
            message: "secret path /etc/factly".to_string(),
        };
        let body = ActionResult::from(&err);
        assert_eq!(body.status, ActionStatus::Error);
        assert_eq!(body.message.as_deref(), Some("An internal error occurred"));
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(http_status(ActionStatus::Success), StatusCode::OK);
        assert_eq!(http_status(ActionStatus::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            http_status(ActionStatus::ValidationError),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
