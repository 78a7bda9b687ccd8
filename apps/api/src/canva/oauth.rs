//! Helpers for the authorization-code connect flow.

use axum::{
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

use crate::errors::AppError;

/// Only same-site relative paths may be used as a post-connect redirect.
pub fn validate_return_to(return_to: Option<String>) -> Result<Option<String>, AppError> {
    let Some(path) = return_to.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
        return Err(AppError::Validation(
            "return_to must be a relative path".to_string(),
        ));
    }
    Ok(Some(path))
}

pub fn redirect_target(return_to: &str, outcome: Result<(), &str>) -> String {
    let separator = if return_to.contains('?') { '&' } else { '?' };
    match outcome {
        Ok(()) => format!("{return_to}{separator}canva=connected"),
        Err(reason) => {
            let reason: String = url::form_urlencoded::byte_serialize(reason.as_bytes()).collect();
            format!("{return_to}{separator}canva=error&reason={reason}")
        }
    }
}

/// Redirects back to the app when a return path was given, otherwise
/// answers with JSON.
pub fn finish(return_to: Option<&str>, outcome: Result<(), &str>) -> Response {
    match (return_to, outcome) {
        (Some(path), outcome) => Redirect::to(&redirect_target(path, outcome)).into_response(),
        (None, Ok(())) => Json(json!({ "connected": true })).into_response(),
        (None, Err(reason)) => {
            Json(json!({ "connected": false, "error": reason })).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header::LOCATION, StatusCode};

    use super::*;

    #[test]
    fn test_return_to_must_be_relative() {
        assert_eq!(
            validate_return_to(Some("/proposals/42".to_string())).unwrap(),
            Some("/proposals/42".to_string())
        );
        assert_eq!(validate_return_to(Some("  ".to_string())).unwrap(), None);
        assert!(validate_return_to(Some("https://evil.example".to_string())).is_err());
        assert!(validate_return_to(Some("//evil.example".to_string())).is_err());
    }

    #[test]
    fn test_redirect_target_appends_outcome() {
        assert_eq!(
            redirect_target("/settings", Ok(())),
            "/settings?canva=connected"
        );
        assert_eq!(
            redirect_target("/settings?tab=design", Err("access denied")),
            "/settings?tab=design&canva=error&reason=access+denied"
        );
    }

    #[test]
    fn test_finish_redirects_when_return_path_present() {
        let response = finish(Some("/settings"), Ok(()));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/settings?canva=connected"
        );
        assert_eq!(finish(None, Ok(())).status(), StatusCode::OK);
    }
}
