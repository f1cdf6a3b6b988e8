//! Motorway - an authenticating API gateway.
//!
//! Motorway sits in front of two domain services, a vehicle inventory service
//! and a user account service, and exposes a single public HTTP surface for
//! both. For every inbound request it looks the path up in a fixed route
//! table, checks the bearer token when the route is protected, rewrites the
//! request onto the right backend URL and relays the backend's answer.
//!
//! # Architecture
//! The crate follows a hexagonal layout:
//! - `ports` holds the traits the core depends on ([`HttpClient`],
//!   [`CredentialVerifier`])
//! - `adapters` implements them (hyper-rustls client, JWT verifier) and hosts
//!   the axum-facing [`HttpHandler`]
//! - `core` holds the route table, auth gate, backend router, proxy forwarder
//!   and the error taxonomy; it performs no I/O of its own
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use motorway::{HttpClientAdapter, HttpHandler, JwtVerifier, config::ServerConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config: ServerConfig = motorway::config::loader::load_config("config.toml").await?;
//! let verifier = Arc::new(JwtVerifier::new(&config.auth)?);
//! let client = Arc::new(HttpClientAdapter::new()?);
//! let app = HttpHandler::new(&config, verifier, client)?.into_router();
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Startup APIs return `eyre::Result<T>`. Request handling never fails: every
//! error is mapped to a single JSON response `{"error": ..., "code": ...}`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler, JwtVerifier},
    core::{GatewayError, RouteTable},
    ports::{credential_verifier::CredentialVerifier, http_client::HttpClient},
    utils::GracefulShutdown,
};
