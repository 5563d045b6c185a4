//! Boundary error responses
//!
//! Every failure leaves the service as `{"error": "..."}` with the status
//! chosen by [`DocentError::status_code`]. Completion errors carry the
//! provider's own message unmodified.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::error::DocentError;

impl IntoResponse for DocentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let origin = self.origin();

        if status.is_server_error() {
            error!(error_origin = %origin, status = status.as_u16(), "{}", self);
        } else {
            warn!(error_origin = %origin, status = status.as_u16(), "{}", self);
        }

        let retry_after = match &self {
            DocentError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };

        let body = serde_json::json!({ "error": public_message(&self) });
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Text safe to show the caller
fn public_message(error: &DocentError) -> String {
    match error {
        DocentError::Io(_) | DocentError::Server(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_message() {
        let response = DocentError::upstream(401, "No auth credentials found").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No auth credentials found");
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let response = DocentError::RateLimited {
            message: "Too many requests".to_string(),
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
        assert_eq!(body_json(response).await["error"], "Too many requests");
    }

    #[tokio::test]
    async fn config_error_names_the_problem() {
        let response =
            DocentError::Config("OPENROUTER_API_KEY is not configured".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(
            json["error"],
            "Configuration error: OPENROUTER_API_KEY is not configured"
        );
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response = DocentError::Server("bind failed on 10.0.0.5".to_string()).into_response();
        assert_eq!(body_json(response).await["error"], "Internal Server Error");
    }
}
