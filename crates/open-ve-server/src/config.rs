//! Configuration record (`SPEC_FULL.md` §3.1): layered defaults → YAML
//! file → `OPEN_VE_`-prefixed environment variables, built with the
//! `config` crate. Field names and nesting mirror
//! `examples/original_source/go/pkg/config/config.go`'s `viper`-bound
//! struct, translated from Go's `mode`/`slave`/`http`/`grpc`/`store`/
//! `log` tree into idiomatic Rust with the same YAML keys.

use serde::Deserialize;

use open_ve_core::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Master,
    Slave,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Master
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlaveConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "slaveHTTPAddr")]
    pub slave_http_addr: String,
    #[serde(default, rename = "masterHTTPAddr")]
    pub master_http_addr: String,
    #[serde(default, rename = "masterAuthn")]
    pub master_authn: AuthnSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "certPath")]
    pub cert_path: String,
    #[serde(default, rename = "keyPath")]
    pub key_path: String,
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_grpc_addr() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_store_engine() -> String {
    "memory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cors_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_addr")]
    pub addr: String,
    #[serde(default = "default_cors_wildcard", rename = "corsAllowedOrigins")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_cors_wildcard", rename = "corsAllowedHeaders")]
    pub cors_allowed_headers: Vec<String>,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
            cors_allowed_origins: default_cors_wildcard(),
            cors_allowed_headers: default_cors_wildcard(),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrpcConfig {
    #[serde(default = "default_grpc_addr")]
    pub addr: String,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            addr: default_grpc_addr(),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: i64,
    #[serde(default, rename = "poolSize")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_engine")]
    pub engine: String,
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: default_store_engine(),
            redis: RedisConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresharedAuthnSettings {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthnSettings {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub preshared: PresharedAuthnSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub slave: SlaveConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub grpc: GrpcConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub authn: AuthnSettings,
    #[serde(default)]
    pub log: LogConfig,
}

/// Loads configuration layered `defaults → <config_path> (if present)
/// → OPEN_VE_*` env vars, matching `viper`'s precedence in the
/// original. `config_path` defaults to `./config.yaml` and is silently
/// skipped if absent, exactly like `viper.ReadInConfig`'s
/// `ConfigFileNotFoundError` handling in `cmd/open-ve/run/run.go`.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let mut builder = config::Config::builder();

    let path = config_path.unwrap_or("config.yaml");
    if std::path::Path::new(path).exists() {
        builder = builder.add_source(config::File::from(std::path::Path::new(path)));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("OPEN_VE")
            .separator("_")
            .try_parsing(true),
    );

    let raw = builder
        .build()
        .map_err(|e| AppError::ServerConfig(e.to_string()))?;

    let cfg: Config = raw
        .try_deserialize()
        .map_err(|e| AppError::ServerConfig(e.to_string()))?;

    validate(&cfg)?;
    Ok(cfg)
}

/// Invalid combinations are fatal at startup (§6): slave mode without
/// id/addresses, TLS enabled without both cert and key paths, or an
/// unrecognized store engine.
fn validate(cfg: &Config) -> Result<(), AppError> {
    if matches!(cfg.mode, Mode::Slave) {
        if cfg.slave.id.is_empty() {
            return Err(AppError::ServerConfig(
                "slave.id is required in slave mode".to_string(),
            ));
        }
        if cfg.slave.slave_http_addr.is_empty() {
            return Err(AppError::ServerConfig(
                "slave.slaveHTTPAddr is required in slave mode".to_string(),
            ));
        }
        if cfg.slave.master_http_addr.is_empty() {
            return Err(AppError::ServerConfig(
                "slave.masterHTTPAddr is required in slave mode".to_string(),
            ));
        }
    }

    if cfg.http.tls.enabled && (cfg.http.tls.cert_path.is_empty() || cfg.http.tls.key_path.is_empty()) {
        return Err(AppError::ServerConfig(
            "http.tls.certPath and http.tls.keyPath are required when http.tls.enabled".to_string(),
        ));
    }
    if cfg.grpc.tls.enabled && (cfg.grpc.tls.cert_path.is_empty() || cfg.grpc.tls.key_path.is_empty()) {
        return Err(AppError::ServerConfig(
            "grpc.tls.certPath and grpc.tls.keyPath are required when grpc.tls.enabled".to_string(),
        ));
    }

    match cfg.store.engine.as_str() {
        "memory" | "redis" => {}
        other => {
            return Err(AppError::ServerConfig(format!(
                "unknown store engine: {other}"
            )))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid_master_mode() {
        let cfg = Config::default();
        assert!(validate(&cfg).is_ok());
        assert!(matches!(cfg.mode, Mode::Master));
        assert_eq!(cfg.store.engine, "memory");
    }

    #[test]
    fn slave_mode_without_id_is_fatal() {
        let cfg = Config {
            mode: Mode::Slave,
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, AppError::ServerConfig(_)));
    }

    #[test]
    fn tls_enabled_without_paths_is_fatal() {
        let mut cfg = Config::default();
        cfg.http.tls.enabled = true;
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, AppError::ServerConfig(_)));
    }

    #[test]
    fn unknown_store_engine_is_fatal() {
        let mut cfg = Config::default();
        cfg.store.engine = "postgres".to_string();
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, AppError::ServerConfig(_)));
    }

    #[test]
    fn loads_yaml_file_when_present() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "mode: slave").unwrap();
        writeln!(file, "slave:").unwrap();
        writeln!(file, "  id: slave-1").unwrap();
        writeln!(file, "  slaveHTTPAddr: http://slave-1:8080").unwrap();
        writeln!(file, "  masterHTTPAddr: http://master:8080").unwrap();
        let cfg = load(Some(file.path().to_str().unwrap())).unwrap();
        assert!(matches!(cfg.mode, Mode::Slave));
        assert_eq!(cfg.slave.id, "slave-1");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cfg = load(Some("/nonexistent/path/config.yaml")).unwrap();
        assert!(matches!(cfg.mode, Mode::Master));
    }
}
