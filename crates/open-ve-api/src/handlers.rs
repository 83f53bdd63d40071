//! `/v1/check`, `/v1/dsl/register`, `/v1/dsl`, `/v1/slave/register`,
//! `/healthz` handlers.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use open_ve_core::{AppError, AuthnConfig, AuthnMethod, Dsl, SlaveNode, TaggedValue};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequestItem {
    pub id: String,
    #[serde(default)]
    pub variables: HashMap<String, TaggedValue>,
}

#[derive(Debug, Deserialize)]
pub struct CheckBatchRequest {
    pub validations: Vec<CheckRequestItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckResultItem {
    pub id: String,
    pub is_valid: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CheckBatchResponse {
    pub results: Vec<CheckResultItem>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let ctx = open_ve_service::AuthContext::from_bearer(bearer_token(headers));
    state.authenticator.authenticate(&ctx).await
}

/// The RPC `Check` handler, reached after the forward and type-convert
/// middleware have already narrowed the batch to locally-owned units
/// and coerced each binding to its declared scalar type (§4.8).
#[instrument(skip(state, headers, request))]
pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckBatchRequest>,
) -> ApiResult<Json<CheckBatchResponse>> {
    authenticate(&state, &headers).await?;

    let mut results = Vec::with_capacity(request.validations.len());
    for item in request.validations {
        let result = state.evaluator.evaluate(&item.id, item.variables).await?;
        results.push(CheckResultItem {
            id: item.id,
            is_valid: result.is_valid,
            message: result.message,
        });
    }

    Ok(Json(CheckBatchResponse { results }))
}

/// `POST /v1/dsl/register` — the RPC `Register` handler.
#[instrument(skip(state, headers, dsl))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dsl): Json<Dsl>,
) -> ApiResult<()> {
    authenticate(&state, &headers).await?;
    state.registrar.register(dsl).await?;
    Ok(())
}

/// `GET /v1/dsl` — the RPC `Read` handler.
#[instrument(skip(state, headers))]
pub async fn read_dsl(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Dsl>> {
    authenticate(&state, &headers).await?;
    let dsl = state.registrar.read().await?;
    Ok(Json(dsl))
}

#[derive(Debug, Deserialize)]
pub struct SlaveRegisterWireAuthn {
    pub method: Option<String>,
    pub preshared: Option<SlaveRegisterWirePreshared>,
}

#[derive(Debug, Deserialize)]
pub struct SlaveRegisterWirePreshared {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SlaveRegisterRequest {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub validation_ids: Vec<String>,
    pub authn: Option<SlaveRegisterWireAuthn>,
}

/// `POST /v1/slave/register` (master only, §6).
#[instrument(skip(state, headers, request))]
pub async fn slave_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SlaveRegisterRequest>,
) -> ApiResult<()> {
    authenticate(&state, &headers).await?;

    let Some(registry) = &state.slave_registry else {
        return Err(ApiError(AppError::ServerConfig(
            "slave registration is only accepted on a master node".to_string(),
        )));
    };

    let authn = request
        .authn
        .map(|a| AuthnConfig {
            method: a.method.and_then(|m| match m.as_str() {
                "preshared" => Some(AuthnMethod::Preshared),
                "none" => Some(AuthnMethod::None),
                _ => None,
            }),
            preshared_key: a.preshared.map(|p| p.key),
        })
        .unwrap_or_default();

    registry.register_slave(SlaveNode {
        id: request.id,
        http_address: request.address,
        tls_enabled: request.tls_enabled,
        validation_ids: request.validation_ids,
        authn,
    });

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /healthz` — proxies the RPC health check.
#[instrument]
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "SERVING" })
}
