//! Pre-flight authentication for protected routes.
//!
//! A request enters the gate `Pending` and leaves it either `Admitted` or
//! `Rejected`; both are terminal. The verifier is consulted exactly once and a
//! rejection is final for that request. Nothing downstream runs for a
//! rejected request.
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header};

use crate::ports::credential_verifier::{AuthRejection, CredentialVerifier, Identity};

/// A request that passed the gate.
#[derive(Debug, Clone)]
pub struct Admission {
    pub identity: Identity,
    /// The Authorization header exactly as the client sent it
    pub authorization: HeaderValue,
}

/// Terminal outcome of the gate.
#[derive(Debug, Clone)]
pub enum GateDecision {
    Admitted(Admission),
    Rejected(AuthRejection),
}

impl GateDecision {
    pub fn into_result(self) -> Result<Admission, AuthRejection> {
        match self {
            Self::Admitted(admission) => Ok(admission),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Run the gate for one request's headers.
    pub fn evaluate(&self, headers: &HeaderMap) -> GateDecision {
        let header_value = headers.get(header::AUTHORIZATION);

        let token = match header_value.map(extract_bearer).transpose() {
            Ok(token) => token,
            Err(rejection) => return GateDecision::Rejected(rejection),
        };

        match (self.verifier.verify(token), header_value) {
            (Ok(identity), Some(authorization)) => {
                tracing::debug!(subject = %identity.subject, "Bearer token accepted");
                GateDecision::Admitted(Admission {
                    identity,
                    authorization: authorization.clone(),
                })
            }
            // A verifier must never admit a request without a credential
            (Ok(_), None) => GateDecision::Rejected(AuthRejection::MissingToken),
            (Err(rejection), _) => {
                tracing::debug!(reason = rejection.reason(), "Bearer token rejected");
                GateDecision::Rejected(rejection)
            }
        }
    }
}

/// Pull the token out of a `Bearer <token>` header value. The scheme is
/// matched case-insensitively.
fn extract_bearer(value: &HeaderValue) -> Result<&str, AuthRejection> {
    let value = value.to_str().map_err(|_| AuthRejection::MalformedToken)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthRejection::MalformedToken)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthRejection::MalformedToken);
    }
    Ok(token)
}
