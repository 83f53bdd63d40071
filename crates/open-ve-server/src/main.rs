//! `open-ve` binary: CLI entry point, configuration loading, and
//! process wiring for the two protocol servers and the slave
//! registration task.

mod cli;
mod config;
mod logging;
mod rpc;
mod tls;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, warn};

use open_ve_core::AppError;
use open_ve_rpc::dsl_service_server::DslServiceServer;
use open_ve_rpc::slave_service_server::SlaveServiceServer;
use open_ve_rpc::validate_service_server::ValidateServiceServer;
use open_ve_service::{
    Authenticator, DslSource, Evaluator, NoopAuthenticator, PresharedKeyAuthenticator,
    RegisterHook, ReregisterOnSchemaChange, SchemaRegistrar, SlaveRegistrar, SlaveRegistry,
};
use open_ve_store::{MemoryStore, RedisStore, Store};

use cli::{Cli, Command, GenSource};
use config::{Config, Mode};
use rpc::{DslServiceImpl, SlaveServiceImpl, ValidateServiceImpl};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Run { config } => cmd_run(config.as_deref()).await,
        Command::Gen {
            source: GenSource::Openapi {
                schema_file,
                output_dir,
            },
        } => cmd_gen_openapi(&schema_file, &output_dir),
        Command::Test { dsl_file } => cmd_test(&dsl_file),
    };

    std::process::exit(exit_code);
}

async fn cmd_run(config_path: Option<&str>) -> i32 {
    let cfg = match config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("fatal configuration error: {e}");
            return 1;
        }
    };

    logging::init(&cfg.log.level);
    info!(?cfg.mode, "Open-VE: starting...");

    match run_server(cfg).await {
        Ok(()) => {
            info!("all servers and timers: stopped");
            0
        }
        Err(e) => {
            error!(error = %e, "fatal error");
            1
        }
    }
}

fn node_id(cfg: &Config) -> String {
    match cfg.mode {
        Mode::Master => "master".to_string(),
        Mode::Slave => cfg.slave.id.clone(),
    }
}

async fn build_store(cfg: &Config) -> Result<Arc<dyn Store>, AppError> {
    let node = node_id(cfg);
    match cfg.store.engine.as_str() {
        "redis" => {
            let store = RedisStore::connect(&cfg.store.redis.addr, node)
                .await
                .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryStore::new(node))),
        other => Err(AppError::ServerConfig(format!(
            "unknown store engine: {other}"
        ))),
    }
}

fn build_authenticator(cfg: &Config) -> Arc<dyn Authenticator> {
    match cfg.authn.method.as_str() {
        "preshared" => {
            info!("authenticator: preshared key");
            Arc::new(PresharedKeyAuthenticator::new(cfg.authn.preshared.key.clone()))
        }
        _ => {
            warn!("authenticator: none");
            Arc::new(NoopAuthenticator)
        }
    }
}

/// This node's own gateway authn, in the wire-neutral `AuthnConfig`
/// shape — handed to the `SlaveRegistrar` so it can tell the master how
/// to authenticate calls forwarded back to us (§4.8.1 step 3).
fn own_authn_config(cfg: &Config) -> open_ve_core::AuthnConfig {
    open_ve_core::AuthnConfig {
        method: match cfg.authn.method.as_str() {
            "preshared" => Some(open_ve_core::AuthnMethod::Preshared),
            _ => None,
        },
        preshared_key: Some(cfg.authn.preshared.key.clone()),
    }
}

struct RegistrarDslSource(Arc<SchemaRegistrar>);

#[async_trait::async_trait]
impl DslSource for RegistrarDslSource {
    async fn current_dsl(&self) -> Result<open_ve_core::Dsl, AppError> {
        self.0.read().await
    }
}

async fn run_server(cfg: Config) -> Result<(), AppError> {
    let store = build_store(&cfg).await?;
    let registrar = Arc::new(SchemaRegistrar::new(store.clone()));
    let evaluator = Arc::new(Evaluator::new(store.clone()));
    let authenticator = build_authenticator(&cfg);

    let slave_registry = match cfg.mode {
        Mode::Master => Some(Arc::new(SlaveRegistry::new())),
        Mode::Slave => None,
    };

    let api_mode = match cfg.mode {
        Mode::Master => open_ve_api::Mode::Master,
        Mode::Slave => open_ve_api::Mode::Slave,
    };
    let api_state = open_ve_api::AppState::new(
        api_mode,
        registrar.clone(),
        evaluator.clone(),
        authenticator.clone(),
        slave_registry.clone(),
    );
    let router = open_ve_api::build_router(
        api_state,
        &cfg.http.cors_allowed_origins,
        &cfg.http.cors_allowed_headers,
    );

    let http_addr: SocketAddr = cfg
        .http
        .addr
        .parse()
        .map_err(|e| AppError::ServerConfig(format!("invalid http.addr: {e}")))?;
    let grpc_addr: SocketAddr = cfg
        .grpc
        .addr
        .parse()
        .map_err(|e| AppError::ServerConfig(format!("invalid grpc.addr: {e}")))?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let mut http_shutdown_rx = shutdown_tx.subscribe();
    let mut rpc_shutdown_rx = shutdown_tx.subscribe();

    let http_task: tokio::task::JoinHandle<std::io::Result<()>> = if cfg.http.tls.enabled {
        let tls_config = tls::http_rustls_config(&cfg.http.tls).await?;
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = http_shutdown_rx.recv().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(1)));
        });
        info!(addr = %http_addr, tls = true, "gateway server: starting...");
        tokio::spawn(async move {
            axum_server::bind_rustls(http_addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        })
    } else {
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| AppError::ServerConfig(format!("failed to bind {http_addr}: {e}")))?;
        info!(addr = %http_addr, tls = false, "gateway server: starting...");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown_rx.recv().await;
                })
                .await
        })
    };

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ValidateServiceServer<ValidateServiceImpl>>()
        .await;

    let validate_service = ValidateServiceImpl {
        evaluator: evaluator.clone(),
        authenticator: authenticator.clone(),
    };
    let dsl_service = DslServiceImpl {
        registrar: registrar.clone(),
        authenticator: authenticator.clone(),
    };
    let slave_service = SlaveServiceImpl {
        slave_registry: slave_registry.clone(),
        authenticator: authenticator.clone(),
    };

    let mut rpc_builder = Server::builder();
    if cfg.grpc.tls.enabled {
        rpc_builder = rpc_builder
            .tls_config(tls::grpc_tls_config(&cfg.grpc.tls)?)
            .map_err(|e| AppError::ServerConfig(format!("invalid grpc TLS cert/key: {e}")))?;
    }
    info!(addr = %grpc_addr, tls = cfg.grpc.tls.enabled, "grpc server: starting...");
    let rpc_task = tokio::spawn(async move {
        rpc_builder
            .add_service(health_service)
            .add_service(ValidateServiceServer::new(validate_service))
            .add_service(DslServiceServer::new(dsl_service))
            .add_service(SlaveServiceServer::new(slave_service))
            .serve_with_shutdown(grpc_addr, async move {
                let _ = rpc_shutdown_rx.recv().await;
            })
            .await
    });

    let slave_cancel = CancellationToken::new();
    let slave_task = if let Mode::Slave = cfg.mode {
        let slave_registrar = Arc::new(SlaveRegistrar::new(
            cfg.slave.id.clone(),
            cfg.slave.slave_http_addr.clone(),
            cfg.grpc.tls.enabled,
            cfg.slave.master_http_addr.clone(),
            open_ve_core::AuthnConfig {
                method: match cfg.slave.master_authn.method.as_str() {
                    "preshared" => Some(open_ve_core::AuthnMethod::Preshared),
                    _ => None,
                },
                preshared_key: Some(cfg.slave.master_authn.preshared.key.clone()),
            },
            own_authn_config(&cfg),
        ));
        let dsl_source: Arc<dyn DslSource> = Arc::new(RegistrarDslSource(registrar.clone()));

        // §4.3's side effect: a successful local Register re-announces
        // this slave's owned ids to the master immediately, rather than
        // waiting out the rest of the 30s tick.
        let hook: Arc<dyn RegisterHook> = Arc::new(ReregisterOnSchemaChange::new(
            slave_registrar.clone(),
            dsl_source.clone(),
        ));
        registrar.set_hook(hook).await;

        info!("slave registration timer: starting...");
        let token = slave_cancel.clone();
        Some(tokio::spawn(async move {
            slave_registrar.run(dsl_source, token).await;
        }))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining connections");
    let _ = shutdown_tx.send(());
    slave_cancel.cancel();

    let drain = async {
        let _ = http_task.await;
        let _ = rpc_task.await;
        if let Some(task) = slave_task {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_DEADLINE, drain).await.is_err() {
        warn!("graceful shutdown deadline exceeded, exiting anyway");
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn cmd_gen_openapi(schema_file: &str, output_dir: &str) -> i32 {
    logging::init("info");
    info!(schema_file, output_dir, "generating open-ve schema");

    let raw = match std::fs::read_to_string(schema_file) {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "failed to read schema file");
            return 1;
        }
    };
    let document: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => match serde_yaml::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "failed to parse schema file as JSON or YAML");
                return 1;
            }
        },
    };

    let dsl = match open_ve_service::generate_from_openapi2(&document) {
        Ok(dsl) => dsl,
        Err(e) => {
            error!(error = %e, "failed to generate schema");
            return 1;
        }
    };

    let serialized = match serde_yaml::to_string(&dsl) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to serialize schema");
            return 1;
        }
    };

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!(error = %e, "failed to create output dir");
        return 1;
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let output_path = std::path::Path::new(output_dir).join(format!("{timestamp}.yml"));
    if let Err(e) = std::fs::write(&output_path, serialized) {
        error!(error = %e, "failed to write schema file");
        return 1;
    }

    info!(output_path = %output_path.display(), "generated open-ve schema");
    0
}

fn cmd_test(dsl_file: &str) -> i32 {
    logging::init("info");
    info!(dsl_file, "testing open-ve schema");

    let raw = match std::fs::read_to_string(dsl_file) {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "failed to read dsl file");
            return 1;
        }
    };
    let dsl: open_ve_core::Dsl = match serde_yaml::from_str(&raw) {
        Ok(dsl) => dsl,
        Err(e) => {
            error!(error = %e, "failed to parse schema");
            return 1;
        }
    };

    let report = match open_ve_service::run_tests(&dsl) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "failed to test schema");
            return 1;
        }
    };

    let mut num_passed = 0;
    let mut num_failed = 0;
    let mut num_not_found = 0;
    for result in &report.results {
        if result.test_case_not_found {
            num_not_found += 1;
            info!("NotFound: {}", result.id);
        } else if !result.failed_test_cases.is_empty() {
            num_failed += 1;
            info!("FAILED   : {}", result.id);
            for case in &result.failed_test_cases {
                info!("  - {case}");
            }
        } else {
            num_passed += 1;
            info!("PASS     : {}", result.id);
        }
    }
    info!(
        "Results: {num_passed} passed, {num_failed} failed, {num_not_found} not found"
    );

    if report.all_passed() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_master_literal_on_master() {
        let cfg = Config::default();
        assert_eq!(node_id(&cfg), "master");
    }

    #[test]
    fn node_id_is_slave_id_on_slave() {
        let mut cfg = Config::default();
        cfg.mode = Mode::Slave;
        cfg.slave.id = "slave-7".to_string();
        assert_eq!(node_id(&cfg), "slave-7");
    }

    #[test]
    fn gen_openapi_writes_a_skeleton_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("petstore.json");
        std::fs::write(
            &schema_path,
            serde_json::json!({
                "paths": {
                    "/pets": {
                        "post": {
                            "parameters": [{
                                "in": "body",
                                "name": "body",
                                "schema": {
                                    "properties": {
                                        "name": { "type": "string" }
                                    }
                                }
                            }]
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();

        let output_dir = dir.path().join("out");
        let code = cmd_gen_openapi(schema_path.to_str().unwrap(), output_dir.to_str().unwrap());
        assert_eq!(code, 0);

        let written = std::fs::read_dir(&output_dir).unwrap().next().unwrap().unwrap();
        let contents = std::fs::read_to_string(written.path()).unwrap();
        let dsl: open_ve_core::Dsl = serde_yaml::from_str(&contents).unwrap();
        assert_eq!(dsl.validations.len(), 1);
    }

    #[test]
    fn gen_openapi_fails_on_missing_file() {
        assert_eq!(cmd_gen_openapi("/nonexistent/schema.json", "/tmp"), 1);
    }

    #[test]
    fn test_command_reports_failure_exit_code_on_failed_case() {
        let dir = tempfile::tempdir().unwrap();
        let dsl_path = dir.path().join("schema.yml");
        std::fs::write(
            &dsl_path,
            r#"
validations:
  - id: x-price
    expressions:
      - "num > 0"
    variables:
      - name: num
        type: int
    test_cases:
      - name: negative is invalid
        variables:
          num: -5
        expected: true
"#,
        )
        .unwrap();

        let code = cmd_test(dsl_path.to_str().unwrap());
        assert_eq!(code, 1);
    }

    #[test]
    fn test_command_succeeds_when_all_cases_pass() {
        let dir = tempfile::tempdir().unwrap();
        let dsl_path = dir.path().join("schema.yml");
        std::fs::write(
            &dsl_path,
            r#"
validations:
  - id: x-price
    expressions:
      - "num > 0"
    variables:
      - name: num
        type: int
    test_cases:
      - name: positive is valid
        variables:
          num: 5
        expected: true
"#,
        )
        .unwrap();

        let code = cmd_test(dsl_path.to_str().unwrap());
        assert_eq!(code, 0);
    }
}
