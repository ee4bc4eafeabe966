//! Server module for running Terraform providers
//!
//! Terraform launches the provider binary with a magic cookie in the
//! environment, then reads one handshake line from stdout:
//! `1|6|tcp|<addr>|grpc`. TLS is enabled when both a certificate and key
//! are configured, either explicitly or through the environment.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use std::path::PathBuf;
use tonic::transport::{Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const APP_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate; TLS is off unless both cert and key are set
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Refuse to start unless launched by Terraform
    pub require_magic_cookie: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            require_magic_cookie: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with TLS files taken from `TF_PROVIDER_TLS_CERT` and
    /// `TF_PROVIDER_TLS_KEY` when present
    pub fn from_env() -> Self {
        Self {
            cert_path: std::env::var_os("TF_PROVIDER_TLS_CERT").map(PathBuf::from),
            key_path: std::env::var_os("TF_PROVIDER_TLS_KEY").map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn with_tls(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.cert_path = Some(cert_path);
        self.key_path = Some(key_path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn without_magic_cookie(mut self) -> Self {
        self.require_magic_cookie = false;
        self
    }
}

/// Check that the process was started by Terraform
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, APP_PROTOCOL_VERSION, addr
    )
}

async fn load_tls(config: &ServerConfig) -> Result<Option<ServerTlsConfig>> {
    let (cert_path, key_path) = match (&config.cert_path, &config.key_path) {
        (Some(cert), Some(key)) => (cert, key),
        (None, None) => return Ok(None),
        _ => {
            return Err(TfplugError::TlsError(
                "both a certificate and a key are required for TLS".to_string(),
            ))
        }
    };

    let cert = tokio::fs::read(cert_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
    let key = tokio::fs::read(key_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

    // another component may already have installed one
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    Ok(Some(
        ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
    ))
}

/// Serve a provider until Terraform closes the connection or the process is
/// interrupted
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if config.require_magic_cookie {
        check_magic_cookie()?;
    }

    let tls = load_tls(&config).await?;

    let grpc_server = GrpcProviderServer::new(provider);
    let root = grpc_server.root_context();
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let actual_addr = listener.local_addr()?;

    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder.tls_config(tls)?;
    }
    let server = builder.add_service(provider_service);

    tracing::info!(address = %actual_addr, "provider listening");
    println!("{}", handshake_line(&actual_addr));

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    server
        .serve_with_incoming_shutdown(incoming, async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, shutting down");
                    root.cancel();
                }
                _ = root.cancelled() => {
                    tracing::info!("provider stopped");
                }
            }
        })
        .await?;

    Ok(())
}

/// Convenience function to run a provider with environment-derived configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::from_env()).await
}
