//! Outbound forwarding and response relay.
use std::sync::Arc;

use axum::{
    body::Body as AxumBody,
    http::{HeaderValue, Request, Response, StatusCode, Uri, header},
    response::IntoResponse,
};
use bytes::Bytes;
use http_body_util::BodyExt;

use crate::{
    core::{error::GatewayError, router::OutboundTarget},
    ports::http_client::HttpClient,
};

/// What the gateway sends back to the client for a request.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl GatewayResponse {
    /// Synthesize the JSON response for a gateway-level failure.
    pub fn from_error(error: &GatewayError) -> Self {
        Self {
            status: error.status_code(),
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from(error.body().to_string()),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(HeaderValue::from_static("text/html; charset=utf-8")),
            body: Bytes::from(body),
        }
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from(value.to_string()),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(AxumBody::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Issues the single outbound call for a request and relays the outcome.
///
/// Whatever status the backend answers with is passed through untouched. Only
/// a transport failure makes the gateway invent a status (502). No retries.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: Arc<dyn HttpClient>,
}

impl ProxyForwarder {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    pub async fn forward(&self, target: OutboundTarget) -> GatewayResponse {
        let operation = target.operation;
        match self.try_forward(target).await {
            Ok(response) => {
                tracing::info!(
                    operation = %operation,
                    status = response.status.as_u16(),
                    "Backend responded"
                );
                response
            }
            Err(error) => {
                tracing::error!(operation = %operation, error = %error, "Backend call failed");
                GatewayResponse::from_error(&error)
            }
        }
    }

    async fn try_forward(&self, target: OutboundTarget) -> Result<GatewayResponse, GatewayError> {
        let operation = target.operation;
        let failure = |detail: String| GatewayError::GatewayFailure { operation, detail };

        let uri: Uri = target
            .url
            .as_str()
            .parse()
            .map_err(|e| failure(format!("Invalid backend URI {}: {e}", target.url)))?;

        let mut builder = Request::builder().method(target.method).uri(uri);
        if let Some(authorization) = target.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let Some(content_type) = target.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(AxumBody::from(target.body))
            .map_err(|e| failure(format!("Failed to build backend request: {e}")))?;

        let response = self
            .client
            .send_request(request)
            .await
            .map_err(|e| failure(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| failure(format!("Failed to read backend response body: {e}")))?
            .to_bytes();

        Ok(GatewayResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body,
        })
    }
}
