//! Conversion of handler failures into responses

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::content::ContentError;
use crate::webhook::WebhookError;

const SERVER_ERROR_PAGE: &str = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>500</title></head><body><h1>500</h1></body></html>\n";

/// Failures that end a page request with a 500
#[derive(Debug, Error)]
pub enum AppError {
    #[error("content unavailable: {0}")]
    Content(#[from] ContentError),

    #[error("template error: {0:#}")]
    Template(#[from] anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            WebhookError::NotConfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "webhook not configured")
            }
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "invalid signature")
            }
            WebhookError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "malformed payload"),
            WebhookError::UpdateFailed(_) | WebhookError::Timeout(_) | WebhookError::Reload(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "refresh failed")
            }
        };

        if status.is_server_error() {
            tracing::error!("Webhook delivery failed: {}", self);
        } else {
            tracing::warn!("Webhook delivery rejected: {}", self);
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_webhook_status_codes() {
        let cases = [
            (WebhookError::NotConfigured, StatusCode::INTERNAL_SERVER_ERROR),
            (WebhookError::MissingSignature, StatusCode::UNAUTHORIZED),
            (WebhookError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (
                WebhookError::MalformedPayload("eof".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                WebhookError::Timeout(Duration::from_secs(60)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WebhookError::Reload(ContentError::MissingDirectory(PathBuf::from("posts"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_app_error_is_500() {
        let err = AppError::Content(ContentError::MissingDirectory(PathBuf::from("posts")));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
