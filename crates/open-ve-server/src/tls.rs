//! TLS material loading for the two protocol servers
//! (`SPEC_FULL.md` §3.1/§6): each of `http.tls` and `grpc.tls` is
//! independently enable-able and points at its own PEM cert/key pair,
//! mirroring `examples/original_source/go/cmd/run/run.go`'s separate
//! `http-tls-*`/`grpc-tls-*` flags.

use open_ve_core::AppError;

use crate::config::TlsConfig;

fn read_pem(path: &str) -> Result<Vec<u8>, AppError> {
    std::fs::read(path).map_err(|e| AppError::ServerConfig(format!("failed to read {path}: {e}")))
}

/// Builds the `axum-server` rustls config for the HTTP gateway.
pub async fn http_rustls_config(cfg: &TlsConfig) -> Result<axum_server::tls_rustls::RustlsConfig, AppError> {
    let cert = read_pem(&cfg.cert_path)?;
    let key = read_pem(&cfg.key_path)?;
    axum_server::tls_rustls::RustlsConfig::from_pem(cert, key)
        .await
        .map_err(|e| AppError::ServerConfig(format!("invalid http TLS cert/key: {e}")))
}

/// Builds the `tonic` server TLS config for the gRPC listener.
pub fn grpc_tls_config(cfg: &TlsConfig) -> Result<tonic::transport::ServerTlsConfig, AppError> {
    let cert = read_pem(&cfg.cert_path)?;
    let key = read_pem(&cfg.key_path)?;
    let identity = tonic::transport::Identity::from_pem(cert, key);
    Ok(tonic::transport::ServerTlsConfig::new().identity(identity))
}
