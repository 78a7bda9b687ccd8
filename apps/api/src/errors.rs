use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::canva::client::CanvaError;
use crate::canva::polling::JobError;
use crate::llm_client::LlmError;

/// Whether debug detail (`message`) is attached to error bodies.
/// Set once at startup from `Config::expose_error_details`.
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(true);

pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        details: Option<Value>,
    },

    #[error("Job timed out: {0}")]
    JobTimeout(String),

    #[error("Job failed ({code})")]
    JobFailed { code: String, details: Value },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Llm(e.to_string())
    }
}

impl From<CanvaError> for AppError {
    fn from(e: CanvaError) -> Self {
        match e {
            CanvaError::NotConfigured => AppError::Upstream {
                message: "Canva integration is not configured".to_string(),
                details: None,
            },
            CanvaError::Api { status: 401, .. } => {
                AppError::Unauthorized("Canva rejected the stored access token; reconnect".to_string())
            }
            CanvaError::Api {
                status,
                message,
                details,
            } => AppError::Upstream {
                message: format!("Canva API error ({status}): {message}"),
                details: Some(details),
            },
            other => AppError::Upstream {
                message: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::Timeout { kind, .. } => {
                AppError::JobTimeout(format!("{kind} job did not finish in time"))
            }
            JobError::Failed { code, details } => AppError::JobFailed { code, details },
            JobError::Upstream(message) => AppError::Upstream {
                message,
                details: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let debug_message = self.to_string();
        let mut details: Option<Value> = None;

        let (status, code, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string(), msg),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR".to_string(), msg)
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string(), msg)
            }
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE".to_string(),
                msg,
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR".to_string(),
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR".to_string(),
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Upstream {
                message,
                details: upstream_details,
            } => {
                tracing::error!("Upstream error: {message}");
                details = upstream_details;
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR".to_string(), message)
            }
            AppError::JobTimeout(msg) => {
                tracing::warn!("Job timeout: {msg}");
                (StatusCode::GATEWAY_TIMEOUT, "timeout".to_string(), msg)
            }
            AppError::JobFailed {
                code,
                details: job_details,
            } => {
                tracing::error!("Job failed: {code} {job_details}");
                details = Some(job_details);
                let error = format!("External job failed ({code})");
                (StatusCode::BAD_GATEWAY, code, error)
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR".to_string(),
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR".to_string(),
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = error_body(
            &error,
            &code,
            details,
            EXPOSE_DETAILS
                .load(Ordering::Relaxed)
                .then_some(debug_message),
        );

        (status, Json(body)).into_response()
    }
}

fn error_body(error: &str, code: &str, details: Option<Value>, message: Option<String>) -> Value {
    let mut body = json!({
        "error": error,
        "code": code,
    });
    if let Some(details) = details {
        body["details"] = details;
    }
    if let Some(message) = message {
        body["message"] = Value::String(message);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_omits_message_when_hidden() {
        let body = error_body("Proposal not found", "NOT_FOUND", None, None);
        assert_eq!(body["error"], "Proposal not found");
        assert!(body.get("message").is_none());
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_error_body_carries_details_and_message() {
        let body = error_body(
            "External job failed (autofill_failed)",
            "autofill_failed",
            Some(json!({"reason": "bad field"})),
            Some("Job failed (autofill_failed)".to_string()),
        );
        assert_eq!(body["code"], "autofill_failed");
        assert_eq!(body["details"]["reason"], "bad field");
        assert_eq!(body["message"], "Job failed (autofill_failed)");
    }

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::JobTimeout("x".into()).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_canva_api_errors_keep_details() {
        let err: AppError = CanvaError::Api {
            status: 404,
            message: "Brand template not found".to_string(),
            details: json!({"code": "not_found"}),
        }
        .into();
        match err {
            AppError::Upstream { message, details } => {
                assert!(message.contains("Brand template not found"));
                assert_eq!(details.unwrap()["code"], "not_found");
            }
            other => panic!("unexpected {other:?}"),
        }

        let expired: AppError = CanvaError::Api {
            status: 401,
            message: "expired".to_string(),
            details: Value::Null,
        }
        .into();
        assert!(matches!(expired, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_job_error_timeout_maps_to_timeout_code() {
        let err: AppError = JobError::Timeout {
            kind: "export",
            waited_secs: 180,
        }
        .into();
        assert!(matches!(err, AppError::JobTimeout(_)));
    }
}
