//! Configuration data structures for Motorway.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! to `MOTORWAY__*` environment overrides. They include defaults so that a
//! minimal config only has to name the auth key material.
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VEHICLES_URL: &str = "https://microservice-autos.vercel.app";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://microservicio-usuarios.vercel.app";

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Largest request body accepted for forwarding
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
            backends: BackendsConfig::default(),
            auth: AuthConfig::default(),
            tls: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Base URLs of the two domain services. Fixed for the lifetime of the process.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackendsConfig {
    /// Vehicle inventory service
    pub vehicles: String,
    /// User account service
    pub accounts: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            vehicles: DEFAULT_VEHICLES_URL.to_string(),
            accounts: DEFAULT_ACCOUNTS_URL.to_string(),
        }
    }
}

/// Bearer token verification settings.
///
/// HMAC algorithms read `secret`; RSA and EC algorithms read `public_key_pem`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub algorithm: Algorithm,
    pub secret: Option<String>,
    pub public_key_pem: Option<String>,
    /// Expected `iss` claim; unchecked when absent
    pub issuer: Option<String>,
    /// Expected `aud` claim; unchecked when absent
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp` / `nbf`
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: None,
            leeway_secs: 0,
        }
    }
}

impl AuthConfig {
    /// Whether the configured algorithm is keyed by a shared secret.
    pub fn uses_shared_secret(&self) -> bool {
        matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        )
    }
}

/// TLS configuration with a manual certificate/key pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TlsConfig {
    /// Path to PEM encoded certificate chain
    pub cert_path: String,
    /// Path to PEM encoded PKCS#8 private key
    pub key_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    max_body_bytes: Option<usize>,
    vehicles_url: Option<String>,
    accounts_url: Option<String>,
    auth: Option<AuthConfig>,
    tls: Option<TlsConfig>,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Set the vehicle service base URL
    pub fn vehicles_url(mut self, url: impl Into<String>) -> Self {
        self.vehicles_url = Some(url.into());
        self
    }

    /// Set the account service base URL
    pub fn accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = Some(url.into());
        self
    }

    /// Verify HS256 tokens with the given shared secret
    pub fn hmac_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig {
            secret: Some(secret.into()),
            ..AuthConfig::default()
        });
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set TLS configuration with manual certificate paths
    pub fn tls(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> ServerConfig {
        let defaults = BackendsConfig::default();
        ServerConfig {
            listen_addr: self.listen_addr.unwrap_or_else(default_listen_addr),
            max_body_bytes: self.max_body_bytes.unwrap_or_else(default_max_body_bytes),
            backends: BackendsConfig {
                vehicles: self.vehicles_url.unwrap_or(defaults.vehicles),
                accounts: self.accounts_url.unwrap_or(defaults.accounts),
            },
            auth: self.auth.unwrap_or_default(),
            tls: self.tls,
            logging: LoggingConfig::default(),
        }
    }
}
