//! Backend target resolution.
//!
//! [`BackendRouter::resolve`] turns a matched route plus the inbound request
//! into the single outbound call the gateway will make. It performs no I/O and
//! never mutates its inputs.
use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderValue, Method, header};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::{
    config::BackendsConfig,
    core::{
        error::GatewayError,
        routes::{Domain, Operation, RouteDefinition},
    },
};

/// Limit used when `/mostrar/autoslimite/{limit}` is not a positive number.
pub const DEFAULT_LIMIT: u32 = 5;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RouterError {
    /// Error when a configured base URL is unusable
    #[error("Invalid backend base URL for {domain:?}: {reason}")]
    InvalidBaseUrl { domain: Domain, reason: String },
}

/// Inbound request as seen by the pipeline, after route matching.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub path_params: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IncomingRequest {
    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The one outbound call made for a request.
#[derive(Debug, Clone)]
pub struct OutboundTarget {
    pub operation: Operation,
    pub method: Method,
    pub url: Url,
    /// Original Authorization header, forwarded byte-for-byte on protected routes
    pub authorization: Option<HeaderValue>,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Maps routes onto backend URLs. Holds only the immutable base URLs.
#[derive(Debug, Clone)]
pub struct BackendRouter {
    vehicles: Url,
    accounts: Url,
}

impl BackendRouter {
    pub fn new(backends: &BackendsConfig) -> Result<Self, RouterError> {
        Ok(Self {
            vehicles: Self::parse_base(Domain::Vehicles, &backends.vehicles)?,
            accounts: Self::parse_base(Domain::Accounts, &backends.accounts)?,
        })
    }

    fn parse_base(domain: Domain, raw: &str) -> Result<Url, RouterError> {
        let url = Url::parse(raw).map_err(|e| RouterError::InvalidBaseUrl {
            domain,
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(RouterError::InvalidBaseUrl {
                domain,
                reason: format!("'{raw}' is not an http(s) base URL"),
            });
        }
        Ok(url)
    }

    pub fn base_url(&self, domain: Domain) -> &Url {
        match domain {
            Domain::Vehicles => &self.vehicles,
            Domain::Accounts => &self.accounts,
        }
    }

    /// Build the outbound target for `operation` served through `route`.
    pub fn resolve(
        &self,
        route: &RouteDefinition,
        operation: Operation,
        request: &IncomingRequest,
    ) -> Result<OutboundTarget, GatewayError> {
        if operation == Operation::SearchCars
            && request.query_param("brand").is_none_or(|b| b.trim().is_empty())
        {
            return Err(GatewayError::BadRequest(
                "Missing search parameter \"brand\"".to_string(),
            ));
        }

        let mut url = self.base_url(operation.domain()).clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                GatewayError::BadRequest("Backend base URL cannot carry a path".to_string())
            })?;
            segments.pop_if_empty();
            for segment in operation.backend_path().split('/').filter(|s| !s.is_empty()) {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some("limit") => {
                        let limit = parse_limit(request.path_params.get("limit").map(String::as_str));
                        segments.push(&limit.to_string());
                    }
                    Some(name) => {
                        let value = request.path_params.get(name).ok_or_else(|| {
                            GatewayError::BadRequest(format!("Missing path parameter '{name}'"))
                        })?;
                        // `push` drops dot segments, which would retarget the call
                        if matches!(value.as_str(), "" | "." | "..") {
                            return Err(GatewayError::BadRequest(format!(
                                "Path parameter '{name}' is not a valid identifier"
                            )));
                        }
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }

        if operation.forwards_query() && !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        let authorization = if route.protected {
            request.headers.get(header::AUTHORIZATION).cloned()
        } else {
            None
        };

        let (content_type, body) = if operation.forwards_body() {
            let content_type = request
                .headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .or_else(|| {
                    (!request.body.is_empty())
                        .then(|| HeaderValue::from_static("application/json"))
                });
            (content_type, request.body.clone())
        } else {
            (None, Bytes::new())
        };

        Ok(OutboundTarget {
            operation,
            method: route.method.clone(),
            url,
            authorization,
            content_type,
            body,
        })
    }
}

/// Parse the requested result count, falling back to [`DEFAULT_LIMIT`] when it
/// is absent, non-numeric or not positive.
pub fn parse_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_LIMIT)
}
