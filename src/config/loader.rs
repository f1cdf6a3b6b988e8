use std::{net::SocketAddr, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix for environment overrides, e.g. `MOTORWAY__AUTH__SECRET`.
pub const ENV_PREFIX: &str = "MOTORWAY";

/// Load configuration from a file (if present) layered with `MOTORWAY__*`
/// environment variables and the conventional `PORT` variable.
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let mut config = load_layers(config_path, false)?;
    let port = std::env::var("PORT").ok();
    apply_port_override(&mut config, port.as_deref())?;
    Ok(config)
}

/// Load configuration from the file alone, which must exist (used for the validate command)
pub async fn load_config_unchecked(config_path: &str) -> Result<ServerConfig> {
    load_layers(config_path, true)
}

fn load_layers(config_path: &str, file_required: bool) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    };

    let mut builder = Config::builder().add_source(
        File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        )
        .required(file_required),
    );
    if !file_required {
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
    }

    let settings = builder
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}

/// Replace the port of `listen_addr` with `port` when one is given.
pub fn apply_port_override(config: &mut ServerConfig, port: Option<&str>) -> Result<()> {
    let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("PORT must be a number between 0 and 65535, got '{port}'"))?;
    let mut addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    addr.set_port(port);
    config.listen_addr = addr.to_string();
    Ok(())
}
