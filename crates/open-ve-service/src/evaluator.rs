//! Evaluator: given `(id, bindings)`, decides pass/fail for the named
//! unit by fanning every compiled expression out to its own task and
//! aggregating first-error-wins/fail-set-otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::instrument;

use open_ve_core::{AppError, TaggedValue};
use open_ve_dsl::Aet;
use open_ve_store::{Store, StoreError};

/// Per-unit pass/fail with the §4.4 diagnostic message shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub is_valid: bool,
    pub message: String,
}

enum Outcome {
    Pass,
    Fail(String),
    Error(AppError),
}

pub struct Evaluator {
    store: Arc<dyn Store>,
}

impl Evaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, bindings))]
    pub async fn evaluate(
        &self,
        id: &str,
        bindings: HashMap<String, TaggedValue>,
    ) -> Result<CheckResult, AppError> {
        let _variables = self.store.read_variables(id).await.map_err(|e| match e {
            StoreError::KeyMissing(_) => AppError::UnitNotFound(id.to_string()),
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
        })?;

        let encoded_asts = self
            .store
            .read_all_ast(id)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        if encoded_asts.is_empty() {
            return Ok(CheckResult {
                is_valid: true,
                message: String::new(),
            });
        }

        let bindings = Arc::new(bindings);
        let tasks = encoded_asts.into_iter().map(|bytes| {
            let bindings = bindings.clone();
            tokio::spawn(async move { evaluate_one(&bytes, &bindings) })
        });

        let joined = join_all(tasks).await;

        let mut failed = Vec::new();
        let mut first_error: Option<AppError> = None;
        for result in joined {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(join_err) => Outcome::Error(AppError::ServerInternal(join_err.to_string())),
            };
            match outcome {
                Outcome::Pass => {}
                Outcome::Fail(source) => failed.push(source),
                Outcome::Error(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        if failed.is_empty() {
            Ok(CheckResult {
                is_valid: true,
                message: String::new(),
            })
        } else {
            Ok(CheckResult {
                is_valid: false,
                message: format!("failed validations: {}", failed.join(", ")),
            })
        }
    }
}

fn evaluate_one(bytes: &[u8], bindings: &HashMap<String, TaggedValue>) -> Outcome {
    let aet = match Aet::from_bytes(bytes) {
        Ok(aet) => aet,
        Err(e) => return Outcome::Error(AppError::ServerInternal(e.to_string())),
    };

    match open_ve_dsl::evaluate(&aet, bindings) {
        Ok(true) => Outcome::Pass,
        Ok(false) => Outcome::Fail(aet.source),
        Err(open_ve_dsl::DslError::TypeMismatch(name)) => Outcome::Error(
            AppError::RequestParameterInvalid(format!("binding type mismatch for `{name}`")),
        ),
        Err(e) => Outcome::Error(AppError::ServerInternal(e.to_string())),
    }
}
