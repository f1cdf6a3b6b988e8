use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a presented (or missing) credential was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Malformed bearer token")]
    MalformedToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token has expired")]
    Expired,
    /// Issuer, audience or not-before checks failed
    #[error("Token claims are not acceptable")]
    InvalidClaims,
}

impl AuthRejection {
    /// Machine-readable reason code.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "token_expired",
            Self::InvalidClaims => "invalid_claims",
        }
    }

    /// 401 when no usable credential was presented, 403 when one was presented and refused.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::MalformedToken => StatusCode::UNAUTHORIZED,
            Self::InvalidSignature | Self::Expired | Self::InvalidClaims => StatusCode::FORBIDDEN,
        }
    }
}

/// The caller identity decoded from a verified token. Lives for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub subject: String,
    /// Every claim other than `sub` and `exp`
    pub claims: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

/// CredentialVerifier defines the port for deciding whether a bearer token is acceptable.
///
/// `token` is `None` when the request carried no Authorization header.
/// Implementations must not have side effects.
pub trait CredentialVerifier: Send + Sync + 'static {
    fn verify(&self, token: Option<&str>) -> Result<Identity, AuthRejection>;
}
