use std::net::SocketAddr;

use eyre::Result;

use crate::config::models::{AuthConfig, ServerConfig, TlsConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid TLS configuration: {message}")]
    InvalidTls { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if let Err(e) = Self::validate_url(&config.backends.vehicles, "backends.vehicles") {
            errors.push(e);
        }
        if let Err(e) = Self::validate_url(&config.backends.accounts, "backends.accounts") {
            errors.push(e);
        }

        if let Err(mut auth_errors) = Self::validate_auth_config(&config.auth) {
            errors.append(&mut auth_errors);
        }

        if let Some(tls_config) = &config.tls {
            if let Err(e) = Self::validate_tls_config(tls_config) {
                errors.push(e);
            }
        }

        if tracing_subscriber::EnvFilter::try_new(&config.logging.level).is_err() {
            errors.push(ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: format!("'{}' is not a valid filter directive", config.logging.level),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                if url.query().is_some() || url.fragment().is_some() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "Base URL must not carry a query or fragment".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn validate_auth_config(config: &AuthConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if config.uses_shared_secret() {
            match config.secret.as_deref().map(str::trim) {
                None | Some("") => errors.push(ValidationError::MissingField {
                    field: "auth.secret".to_string(),
                }),
                Some(secret) if secret.len() < 16 => errors.push(ValidationError::InvalidField {
                    field: "auth.secret".to_string(),
                    message: "Shared secret must be at least 16 bytes".to_string(),
                }),
                Some(_) => {}
            }
        } else {
            match config.public_key_pem.as_deref().map(str::trim) {
                None | Some("") => errors.push(ValidationError::MissingField {
                    field: "auth.public_key_pem".to_string(),
                }),
                Some(pem) if !pem.starts_with("-----BEGIN") => {
                    errors.push(ValidationError::InvalidField {
                        field: "auth.public_key_pem".to_string(),
                        message: "Expected a PEM encoded public key".to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        for (field, value) in [("auth.issuer", &config.issuer), ("auth.audience", &config.audience)]
        {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: "Cannot be empty when set".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate TLS configuration
    fn validate_tls_config(config: &TlsConfig) -> ValidationResult<()> {
        if !std::path::Path::new(&config.cert_path).exists() {
            return Err(ValidationError::InvalidTls {
                message: format!("Certificate file does not exist: {}", config.cert_path),
            });
        }
        if !std::path::Path::new(&config.key_path).exists() {
            return Err(ValidationError::InvalidTls {
                message: format!("Private key file does not exist: {}", config.key_path),
            });
        }
        Ok(())
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .map(|e| format!("  • {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
