//! Gateway error types.
//!
//! Every failure a request can hit is turned into exactly one JSON response of
//! the shape `{"error": <message>, "code": <error_type>}`. Messages are safe to
//! show to clients: backend URLs and transport causes stay in the logs.

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::{core::routes::Operation, ports::credential_verifier::AuthRejection};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication rejected: {0}")]
    AuthRejected(#[from] AuthRejection),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No route for path: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        method: Method,
        allowed: Vec<Method>,
    },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The backend could not be reached or its response could not be read.
    #[error("{operation} failed: {detail}")]
    GatewayFailure {
        operation: Operation,
        detail: String,
    },
}

impl GatewayError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::AuthRejected(rejection) => rejection.reason(),
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::GatewayFailure { .. } => "bad_gateway",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthRejected(rejection) => rejection.status_code(),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::GatewayFailure { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message returned to the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::AuthRejected(rejection) => rejection.to_string(),
            Self::BadRequest(reason) => reason.clone(),
            Self::NotFound(_) => "Not found".to_owned(),
            Self::MethodNotAllowed { method, .. } => format!("Method {method} not allowed"),
            Self::PayloadTooLarge { .. } => "Request body too large".to_owned(),
            // Hide transport details
            Self::GatewayFailure { operation, .. } => operation.failure_message().to_owned(),
        }
    }

    /// Serialized JSON error body.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.client_message(),
            "code": self.error_type(),
        })
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, axum::Json(self.body())).into_response();

        match &self {
            Self::AuthRejected(_) if status == StatusCode::UNAUTHORIZED => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer realm=\"motorway\""),
                );
            }
            Self::MethodNotAllowed { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            GatewayError::AuthRejected(AuthRejection::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::AuthRejected(AuthRejection::Expired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::BadRequest("brand".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::GatewayFailure {
                operation: Operation::ListCars,
                detail: "connection refused".into(),
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn gateway_failure_hides_detail() {
        let response = GatewayError::GatewayFailure {
            operation: Operation::CreateCar,
            detail: "Request to POST http://10.0.0.7/api/create/car failed".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Failed to create car");
        assert!(!String::from_utf8_lossy(&body).contains("10.0.0.7"));
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = GatewayError::AuthRejected(AuthRejection::MissingToken).into_response();
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let response = GatewayError::AuthRejected(AuthRejection::InvalidSignature).into_response();
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn method_not_allowed_lists_allowed() {
        let response = GatewayError::MethodNotAllowed {
            method: Method::GET,
            allowed: vec![Method::POST],
        }
        .into_response();
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }
}
