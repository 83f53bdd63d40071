//! Shared application state for the HTTP gateway: `Arc`-wrapped
//! service handles, cheap to `Clone` into each request.

use std::sync::Arc;

use open_ve_service::{Authenticator, Evaluator, SchemaRegistrar, SlaveRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Master,
    Slave,
}

#[derive(Clone)]
pub struct AppState {
    pub mode: Mode,
    pub registrar: Arc<SchemaRegistrar>,
    pub evaluator: Arc<Evaluator>,
    pub authenticator: Arc<dyn Authenticator>,
    /// `None` on a slave node — forwarding only happens on the master.
    pub slave_registry: Option<Arc<SlaveRegistry>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        mode: Mode,
        registrar: Arc<SchemaRegistrar>,
        evaluator: Arc<Evaluator>,
        authenticator: Arc<dyn Authenticator>,
        slave_registry: Option<Arc<SlaveRegistry>>,
    ) -> Self {
        Self {
            mode,
            registrar,
            evaluator,
            authenticator,
            slave_registry,
            http_client: reqwest::Client::new(),
        }
    }
}
