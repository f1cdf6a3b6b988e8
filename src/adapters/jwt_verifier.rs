//! Local bearer token verification with `jsonwebtoken`.
use chrono::DateTime;
use eyre::{Result, WrapErr, eyre};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    config::AuthConfig,
    ports::credential_verifier::{AuthRejection, CredentialVerifier, Identity},
};

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    exp: i64,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Verifies signed JWTs against a key fixed at startup.
///
/// `exp` is always required. `iss` and `aud` are checked only when
/// configured.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(auth: &AuthConfig) -> Result<Self> {
        let key = Self::decoding_key(auth)?;

        let mut validation = Validation::new(auth.algorithm);
        validation.leeway = auth.leeway_secs;
        validation.validate_nbf = true;
        if let Some(issuer) = &auth.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &auth.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        tracing::info!(
            algorithm = ?auth.algorithm,
            issuer = auth.issuer.as_deref().unwrap_or("-"),
            audience = auth.audience.as_deref().unwrap_or("-"),
            "JWT verifier configured"
        );
        Ok(Self { key, validation })
    }

    fn decoding_key(auth: &AuthConfig) -> Result<DecodingKey> {
        if auth.uses_shared_secret() {
            let secret = auth
                .secret
                .as_deref()
                .ok_or_else(|| eyre!("auth.secret is required for {:?}", auth.algorithm))?;
            return Ok(DecodingKey::from_secret(secret.as_bytes()));
        }

        let pem = auth
            .public_key_pem
            .as_deref()
            .ok_or_else(|| eyre!("auth.public_key_pem is required for {:?}", auth.algorithm))?
            .as_bytes();

        match auth.algorithm {
            Algorithm::ES256 | Algorithm::ES384 => {
                DecodingKey::from_ec_pem(pem).wrap_err("Invalid EC public key")
            }
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem).wrap_err("Invalid Ed25519 public key"),
            _ => DecodingKey::from_rsa_pem(pem).wrap_err("Invalid RSA public key"),
        }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: Option<&str>) -> Result<Identity, AuthRejection> {
        let token = token.ok_or(AuthRejection::MissingToken)?;
        if token.is_empty() {
            return Err(AuthRejection::MalformedToken);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            let rejection = rejection_for(e.kind());
            tracing::debug!(error = %e, reason = rejection.reason(), "JWT verification failed");
            rejection
        })?;

        let claims = data.claims;
        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthRejection::InvalidClaims)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthRejection::InvalidClaims)?;

        Ok(Identity {
            subject,
            claims: claims.extra,
            expires_at,
        })
    }
}

fn rejection_for(kind: &ErrorKind) -> AuthRejection {
    match kind {
        ErrorKind::ExpiredSignature => AuthRejection::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            AuthRejection::InvalidSignature
        }
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthRejection::InvalidClaims,
        _ => AuthRejection::MalformedToken,
    }
}
