pub mod auth_gate;
pub mod error;
pub mod proxy;
pub mod router;
pub mod routes;

pub use auth_gate::{Admission, AuthGate, GateDecision};
pub use error::GatewayError;
pub use proxy::{GatewayResponse, ProxyForwarder};
pub use router::{BackendRouter, IncomingRequest, OutboundTarget};
pub use routes::{Domain, Operation, RouteTable};
