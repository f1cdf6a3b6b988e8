use std::{fs::File, io::BufReader, net::SocketAddr, path::Path, sync::Arc};

use axum::serve::{Listener, ListenerExt};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use futures_util::StreamExt;
use motorway::{
    HttpClientAdapter, HttpHandler, JwtVerifier,
    config::{ServerConfig, ServerConfigValidator, TlsConfig, loader},
    tracing_setup,
    utils::GracefulShutdown,
};
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

/// Adapts a stream of accepted TLS connections to axum's `Listener`.
struct AxumListener<S> {
    stream: S,
    local_addr: SocketAddr,
}

impl<S, I, E> Listener for AxumListener<S>
where
    S: futures_util::Stream<Item = Result<(I, SocketAddr), E>> + Unpin + Send + 'static,
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    type Io = I;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.stream.next().await {
                Some(Ok((io, addr))) => return (io, addr),
                Some(Err(e)) => tracing::debug!("TLS accept error: {}", e),
                None => std::future::pending().await,
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config = loader::load_config(config_path)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {config_path}"))?;

    tracing_setup::init_tracing(&config.logging)?;

    if !Path::new(config_path).exists() {
        tracing::warn!(
            "Config file {} not found, using defaults and environment overrides",
            config_path
        );
    }
    ServerConfigValidator::validate(&config).wrap_err("Invalid configuration")?;

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let verifier = Arc::new(JwtVerifier::new(&config.auth)?);
    let http_client = Arc::new(HttpClientAdapter::new()?);
    let app = HttpHandler::new(&config, verifier, http_client)?.into_router();

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let shutdown_signal = {
        let graceful_shutdown = graceful_shutdown.clone();
        async move {
            let reason = graceful_shutdown.wait_for_shutdown_signal().await;
            tracing::info!(
                "Shutdown signal received: {:?}, draining in-flight requests",
                reason
            );
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(
        vehicles = %config.backends.vehicles,
        accounts = %config.backends.accounts,
        tls = config.tls.is_some(),
        "Motorway gateway listening on {}",
        addr
    );

    match &config.tls {
        Some(tls) => {
            let acceptor = tls_acceptor(tls)?;
            let local_addr = listener.local_addr().context("Failed to get local addr")?;
            let tls_listener = AxumListener {
                stream: tls_listener::TlsListener::new(acceptor, listener),
                local_addr,
            };

            axum::serve(tls_listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal)
                .await
                .context("Server error")?;
        }
        None => {
            let listener = listener.tap_io(|tcp| {
                if let Err(e) = tcp.set_nodelay(true) {
                    tracing::trace!("Failed to set TCP_NODELAY: {}", e);
                }
            });

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal)
                .await
                .context("Server error")?;
        }
    }

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

fn tls_acceptor(tls: &TlsConfig) -> Result<tokio_rustls::TlsAcceptor> {
    use rustls_pemfile::{certs, pkcs8_private_keys};

    tracing::info!("Starting server with manual TLS");
    let cert_file = &mut BufReader::new(
        File::open(&tls.cert_path)
            .with_context(|| format!("Failed to open cert file {}", tls.cert_path))?,
    );
    let key_file = &mut BufReader::new(
        File::open(&tls.key_path)
            .with_context(|| format!("Failed to open key file {}", tls.key_path))?,
    );

    let cert_chain = certs(cert_file)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse certificate chain")?;
    let key = pkcs8_private_keys(key_file)
        .next()
        .transpose()
        .context("Failed to parse private key")?
        .ok_or_else(|| eyre!("No PKCS#8 private key found in key file"))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key.into())
        .context("Invalid TLS certificate or key")?;

    Ok(tokio_rustls::TlsAcceptor::from(Arc::new(config)))
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config: ServerConfig = match loader::load_config_unchecked(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Vehicle service: {}", config.backends.vehicles);
            println!("   • Account service: {}", config.backends.accounts);
            println!("   • Token algorithm: {:?}", config.auth.algorithm);
            println!("   • TLS Enabled: {}", config.tls.is_some());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure backend URLs start with http:// or https://");
            println!("   • Set auth.secret (16+ bytes) for HS* or auth.public_key_pem otherwise");
            println!("   • Check that TLS file paths exist");
            println!("   • Verify listen address format (e.g., '0.0.0.0:3000')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Motorway gateway configuration
#
# Every key can be overridden from the environment, e.g.
# MOTORWAY__AUTH__SECRET=... or MOTORWAY__BACKENDS__VEHICLES=...
# A plain PORT variable replaces the port of listen_addr.

listen_addr = "0.0.0.0:3000"
max_body_bytes = 10485760

[backends]
vehicles = "https://microservice-autos.vercel.app"
accounts = "https://microservicio-usuarios.vercel.app"

[auth]
algorithm = "HS256"
# Must match the secret the account service signs tokens with
secret = "change-me-to-a-long-random-secret"
# issuer = "accounts"
# audience = "motorway"
leeway_secs = 0

[logging]
level = "info"
format = "json"

# [tls]
# cert_path = "certs/server.crt"
# key_path = "certs/server.key"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'motorway serve --config {config_path}' to start the server");
    Ok(())
}
