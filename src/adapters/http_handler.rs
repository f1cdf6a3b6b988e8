use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    body::Body as AxumBody,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::any,
};
use bytes::Bytes;
use eyre::{Result, WrapErr};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Request, Response};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    adapters::middleware::{X_REQUEST_ID, request_id_middleware, request_timing_middleware},
    config::models::ServerConfig,
    core::{
        auth_gate::AuthGate,
        error::GatewayError,
        proxy::{GatewayResponse, ProxyForwarder},
        router::{BackendRouter, IncomingRequest},
        routes::{LocalPage, RouteAction, RouteTable},
    },
    ports::{credential_verifier::CredentialVerifier, http_client::HttpClient},
};

/// HTTP handler for the Motorway gateway.
///
/// Runs every inbound request through route lookup, the auth gate (protected
/// routes only), body collection, target resolution and forwarding. All
/// collaborators are read-only and shared across requests.
#[derive(Clone)]
pub struct HttpHandler {
    routes: Arc<RouteTable>,
    gate: AuthGate,
    router: Arc<BackendRouter>,
    forwarder: ProxyForwarder,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(
        config: &ServerConfig,
        verifier: Arc<dyn CredentialVerifier>,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let routes = RouteTable::gateway().wrap_err("Invalid gateway route table")?;
        let router =
            BackendRouter::new(&config.backends).wrap_err("Invalid backend configuration")?;

        for route in routes.routes() {
            tracing::debug!(
                method = %route.method,
                pattern = route.pattern,
                protected = route.protected,
                action = ?route.action,
                "Registered route"
            );
        }

        Ok(Self {
            routes: Arc::new(routes),
            gate: AuthGate::new(verifier),
            router: Arc::new(router),
            forwarder: ProxyForwarder::new(http_client),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Main request handler. Every failure becomes a response here.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.dispatch(req).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(
                    "Rejected {} {}: {} ({})",
                    method,
                    path,
                    error,
                    error.status_code()
                );
                error.into_response()
            }
        }
    }

    async fn dispatch(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>, GatewayError> {
        let (parts, body) = req.into_parts();
        let found = self.routes.lookup(&parts.method, parts.uri.path())?;
        let route = found.route;

        // Params are decoded after the gate so a rejection always wins
        if route.protected {
            let admission = self.gate.evaluate(&parts.headers).into_result()?;
            tracing::debug!(subject = %admission.identity.subject, "Request admitted");
        }

        let params = found.decode_params()?;

        let operation = match route.action {
            RouteAction::Local(page) => return Ok(self.local_page(page, &params)),
            RouteAction::Proxy(operation) => operation,
        };

        let body = if operation.forwards_body() {
            self.read_body(body).await?
        } else {
            Bytes::new()
        };

        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let incoming = IncomingRequest {
            path_params: params,
            query,
            headers: parts.headers,
            body,
        };

        let target = self.router.resolve(route, operation, &incoming)?;
        Ok(self.forwarder.forward(target).await.into_response())
    }

    async fn read_body(&self, body: AxumBody) -> Result<Bytes, GatewayError> {
        match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                Err(GatewayError::PayloadTooLarge {
                    limit: self.max_body_bytes,
                })
            }
            Err(e) => {
                tracing::warn!("Failed to read request body: {}", e);
                Err(GatewayError::BadRequest(
                    "Failed to read request body".to_string(),
                ))
            }
        }
    }

    fn local_page(&self, page: LocalPage, params: &HashMap<String, String>) -> Response<AxumBody> {
        match page {
            LocalPage::Index => {
                let item = uuid::Uuid::new_v4();
                let html = format!(
                    "<!DOCTYPE html><html><head><title>Motorway</title></head><body>\
                     <h1>Motorway API</h1>\
                     <p>Item page: <a href=\"/api/item/{item}\">/api/item/{item}</a></p>\
                     </body></html>"
                );
                let mut response = GatewayResponse::html(html).into_response();
                response.headers_mut().insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("s-max-age=1, stale-while-revalidate"),
                );
                response
            }
            LocalPage::Item => {
                let slug = params.get("slug").map(String::as_str).unwrap_or_default();
                GatewayResponse::html(format!("Item: {}", escape_html(slug))).into_response()
            }
            LocalPage::Health => GatewayResponse::json(
                StatusCode::OK,
                &serde_json::json!({
                    "status": "ok",
                    "service": "motorway",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .into_response(),
        }
    }

    /// Build the axum application: a catch-all route delegating to this
    /// handler, wrapped in request-id, timing and CORS layers.
    pub fn into_router(self) -> Router {
        let make_route = |handler: HttpHandler| {
            any(move |req: Request<AxumBody>| {
                let handler = handler.clone();
                async move { handler.handle_request(req).await }
            })
        };

        Router::new()
            .route("/", make_route(self.clone()))
            .route("/{*path}", make_route(self))
            .layer(middleware::from_fn(request_timing_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(cors_layer())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([X_REQUEST_ID.clone()])
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
