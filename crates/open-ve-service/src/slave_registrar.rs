//! Slave Registrar (slave side): periodically publishes this
//! process's id/address/owned validation ids to the configured master
//! over HTTP, on an immediate-then-30s schedule, logging and
//! continuing past any single failed attempt.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use open_ve_core::{AuthnConfig, AuthnMethod, Dsl};

const TICK_PERIOD: Duration = Duration::from_secs(30);
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct RegisterRequestAuthnPreshared<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequestAuthn<'a> {
    method: Option<&'a str>,
    preshared: Option<RegisterRequestAuthnPreshared<'a>>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    id: &'a str,
    address: &'a str,
    tls_enabled: bool,
    validation_ids: Vec<&'a str>,
    authn: RegisterRequestAuthn<'a>,
}

pub struct SlaveRegistrar {
    id: String,
    http_address: String,
    tls_enabled: bool,
    master_url: String,
    master_authn: AuthnConfig,
    /// This slave's own gateway authn, forwarded to the master so the
    /// Slave Registry can authenticate calls it forwards back to us.
    own_authn: AuthnConfig,
    client: reqwest::Client,
}

impl SlaveRegistrar {
    pub fn new(
        id: impl Into<String>,
        http_address: impl Into<String>,
        tls_enabled: bool,
        master_http_address: impl Into<String>,
        master_authn: AuthnConfig,
        own_authn: AuthnConfig,
    ) -> Self {
        Self {
            id: id.into(),
            http_address: http_address.into(),
            tls_enabled,
            master_url: format!(
                "{}/v1/slave/register",
                master_http_address.into().trim_end_matches('/')
            ),
            master_authn,
            own_authn,
            client: reqwest::Client::new(),
        }
    }

    /// One immediate call, then every `TICK_PERIOD` until `token` is
    /// cancelled. Never terminates on its own; failures log and
    /// continue (§4.6).
    pub async fn run(self: Arc<Self>, dsl_source: Arc<dyn DslSource>, token: CancellationToken) {
        info!("slave registration timer started");
        self.register(dsl_source.as_ref()).await;

        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("slave registration timer stopped");
                    return;
                }
                _ = interval.tick() => {
                    self.register(dsl_source.as_ref()).await;
                }
            }
        }
    }

    #[instrument(skip(self, dsl_source))]
    pub async fn register(&self, dsl_source: &dyn DslSource) {
        let dsl = match dsl_source.current_dsl().await {
            Ok(dsl) => dsl,
            Err(e) => {
                error!(error = %e, "failed to read local schema for slave registration");
                return;
            }
        };
        let validation_ids: Vec<&str> = dsl.validations.iter().map(|v| v.id.as_str()).collect();

        let authn = RegisterRequestAuthn {
            method: match self.own_authn.method {
                Some(AuthnMethod::Preshared) => Some("preshared"),
                Some(AuthnMethod::None) => Some("none"),
                None => None,
            },
            preshared: self
                .own_authn
                .preshared_key
                .as_deref()
                .map(|key| RegisterRequestAuthnPreshared { key }),
        };

        let body = RegisterRequest {
            id: &self.id,
            address: &self.http_address,
            tls_enabled: self.tls_enabled,
            validation_ids,
            authn,
        };

        let mut req = self
            .client
            .post(&self.master_url)
            .timeout(CALL_TIMEOUT)
            .json(&body);

        if matches!(self.master_authn.method, Some(AuthnMethod::Preshared)) {
            if let Some(key) = &self.master_authn.preshared_key {
                req = req.bearer_auth(key);
            }
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("slave registration success");
            }
            Ok(resp) => {
                error!(status = %resp.status(), "slave registration rejected by master");
            }
            Err(e) => {
                error!(error = %e, "failed to register to master");
            }
        }
    }
}

/// The registrar needs read-only access to whatever schema this
/// process currently serves locally; on a slave node that's the
/// Schema Registrar's own store-backed `read()`.
#[async_trait::async_trait]
pub trait DslSource: Send + Sync {
    async fn current_dsl(&self) -> Result<Dsl, open_ve_core::AppError>;
}

/// Wired into `SchemaRegistrar::set_hook` on a slave node: a
/// successful local `Register` re-announces the slave's owned ids to
/// the master right away instead of waiting for the next tick.
pub struct ReregisterOnSchemaChange {
    registrar: Arc<SlaveRegistrar>,
    dsl_source: Arc<dyn DslSource>,
}

impl ReregisterOnSchemaChange {
    pub fn new(registrar: Arc<SlaveRegistrar>, dsl_source: Arc<dyn DslSource>) -> Self {
        Self {
            registrar,
            dsl_source,
        }
    }
}

#[async_trait::async_trait]
impl crate::registrar::RegisterHook for ReregisterOnSchemaChange {
    async fn on_registered(&self) {
        self.registrar.register(self.dsl_source.as_ref()).await;
    }
}
