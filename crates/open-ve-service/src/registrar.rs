//! Schema Registrar: replace the current schema with a new one
//! provided by the client. Every unit's expressions are compiled and
//! staged before any store mutation, so a compile failure never leaves
//! a reset-but-unwritten store. This is still not transactional
//! against a crash between `reset()` and the write sequence — that
//! limitation is inherent to the Store's per-key-atomic-only guarantee
//! and is not papered over here.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use open_ve_core::{AppError, Dsl};
use open_ve_store::Store;

/// Invoked after a successful `register()`. The only implementor is
/// the slave-side `SlaveRegistrar`: a slave that just replaced its
/// local schema re-announces itself to the master immediately, rather
/// than waiting out the rest of the 30s tick (§4.3's "Side effect").
#[async_trait::async_trait]
pub trait RegisterHook: Send + Sync {
    async fn on_registered(&self);
}

pub struct SchemaRegistrar {
    store: Arc<dyn Store>,
    hook: RwLock<Option<Arc<dyn RegisterHook>>>,
}

impl SchemaRegistrar {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            hook: RwLock::new(None),
        }
    }

    /// Wire the post-register side effect. Only ever set on a slave
    /// node; a master has no hook and `register()` is a no-op past
    /// the store writes.
    pub async fn set_hook(&self, hook: Arc<dyn RegisterHook>) {
        *self.hook.write().await = Some(hook);
    }

    /// Validate structural invariants, compile every expression in
    /// every unit (staging its AETs in memory), then `reset()` the
    /// store and write the new schema plus each unit's variables and
    /// AETs.
    #[instrument(skip(self, dsl))]
    pub async fn register(&self, dsl: Dsl) -> Result<(), AppError> {
        if let Some(dup) = dsl.first_duplicate_id() {
            return Err(AppError::SchemaError(format!("duplicate validation id: {dup}")));
        }

        let mut staged = Vec::with_capacity(dsl.validations.len());
        for unit in &dsl.validations {
            let mut asts = Vec::with_capacity(unit.expressions.len());
            for expr in &unit.expressions {
                let aet = open_ve_dsl::compile(&unit.variables, expr).map_err(|e| {
                    AppError::ExpressionCompile(format!("{}: {e}", unit.id))
                })?;
                let bytes = aet
                    .to_bytes()
                    .map_err(|e| AppError::ExpressionCompile(format!("{}: {e}", unit.id)))?;
                asts.push(bytes);
            }
            staged.push((unit.id.clone(), unit.variables.clone(), asts));
        }

        self.store
            .reset()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
        self.store
            .write_schema(&dsl)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        for (id, variables, asts) in staged {
            self.store
                .write_variables(&id, &variables)
                .await
                .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
            self.store
                .write_all_ast(&id, &asts)
                .await
                .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
        }

        info!(units = dsl.validations.len(), "schema registered");

        if let Some(hook) = self.hook.read().await.as_ref() {
            hook.on_registered().await;
        }

        Ok(())
    }

    pub async fn read(&self) -> Result<Dsl, AppError> {
        self.store
            .read_schema()
            .await
            .map_err(|e| AppError::UnitNotFound(e.to_string()))
    }
}
