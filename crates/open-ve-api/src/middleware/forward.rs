//! Forward middleware (§4.8.1, master only): on `POST /v1/check`,
//! splits the batch into locally-owned units (left for the downstream
//! handler) and forwardable units (dispatched concurrently to the
//! slaves that registered them), then stitches the two result sets
//! back together. A no-op on a slave node (`state.slave_registry` is
//! `None`).

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use open_ve_core::AuthnMethod;

use crate::error::ErrorBody;
use crate::handlers::CheckResultItem;
use crate::state::AppState;

const PER_CALL_TIMEOUT: Duration = Duration::from_secs(5);
const AGGREGATE_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize, Serialize, Clone)]
struct RawCheckItem {
    id: String,
    #[serde(default)]
    variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawCheckBatch {
    validations: Vec<RawCheckItem>,
}

#[derive(Debug, Serialize)]
struct RawCheckBatchOut {
    validations: Vec<RawCheckItem>,
}

#[derive(Debug, Deserialize)]
struct SlaveCheckResponse {
    results: Vec<CheckResultItem>,
}

pub async fn forward(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(slave_registry) = state.slave_registry.clone() else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| bad_request(format!("failed to read request body: {e}")))?;

    let batch: RawCheckBatch =
        serde_json::from_slice(&bytes).map_err(|e| bad_request(format!("invalid JSON body: {e}")))?;

    let dsl = state
        .registrar
        .read()
        .await
        .map_err(|e| bad_request(format!("failed to load schema: {e}")))?;

    let mut local_subset = Vec::new();
    let mut forward_subset = Vec::new();
    for item in batch.validations {
        if dsl.find(&item.id).is_some() {
            local_subset.push(item);
        } else {
            forward_subset.push(item);
        }
    }

    let forwarded_results = if forward_subset.is_empty() {
        Vec::new()
    } else {
        match dispatch_forwards(&state, &slave_registry, forward_subset).await {
            Ok(results) => results,
            Err(message) => return Err(internal_error(message)),
        }
    };

    let rewritten_body = RawCheckBatchOut {
        validations: local_subset,
    };
    let rewritten_bytes = serde_json::to_vec(&rewritten_body)
        .map_err(|e| bad_request(format!("failed to re-encode body: {e}")))?;
    let downstream_request = Request::from_parts(parts, Body::from(rewritten_bytes));

    let downstream_response = next.run(downstream_request).await;
    if downstream_response.status() != StatusCode::OK {
        // downstream already produced an error response for the local
        // subset; surface it as-is rather than masking it with forwarded
        // results.
        return Ok(downstream_response);
    }

    let (resp_parts, resp_body) = downstream_response.into_parts();
    let resp_bytes = to_bytes(resp_body, MAX_BODY_BYTES)
        .await
        .map_err(|e| internal_error(format!("failed to read downstream response: {e}")))?;
    let downstream: SlaveCheckResponse = serde_json::from_slice(&resp_bytes)
        .map_err(|e| internal_error(format!("failed to decode downstream response: {e}")))?;

    let mut combined = downstream.results;
    combined.extend(forwarded_results);

    let body = Json(serde_json::json!({ "results": combined }));
    let mut response = body.into_response();
    *response.status_mut() = resp_parts.status;
    Ok(response)
}

/// Dispatch every forwardable item concurrently (one single-item
/// `/v1/check` request per item, since each may own a different
/// slave), with a 5 s per-call timeout and a 30 s overall cap. The
/// first failure or timeout aborts the whole forward with
/// `ForwardFailed`; still-in-flight calls are allowed to finish but
/// their results are discarded (§7 propagation rule).
async fn dispatch_forwards(
    state: &AppState,
    registry: &open_ve_service::SlaveRegistry,
    items: Vec<RawCheckItem>,
) -> Result<Vec<CheckResultItem>, String> {
    let calls = items.into_iter().map(|item| {
        let client = state.http_client.clone();
        let slave = registry.find_slave(&item.id);
        async move {
            let slave = slave.ok_or_else(|| format!("no slave owns validation id `{}`", item.id))?;
            let url = format!("{}/v1/check", slave.http_address.trim_end_matches('/'));
            let body = RawCheckBatchOut {
                validations: vec![item],
            };

            let mut req = client.post(&url).timeout(PER_CALL_TIMEOUT).json(&body);
            if matches!(slave.authn.method, Some(AuthnMethod::Preshared)) {
                if let Some(key) = &slave.authn.preshared_key {
                    req = req.bearer_auth(key);
                }
            }

            let resp = req
                .send()
                .await
                .map_err(|e| format!("forward to slave `{}` failed: {e}", slave.id))?;
            if !resp.status().is_success() {
                return Err(format!(
                    "forward to slave `{}` returned status {}",
                    slave.id,
                    resp.status()
                ));
            }
            let parsed: SlaveCheckResponse = resp
                .json()
                .await
                .map_err(|e| format!("invalid response from slave `{}`: {e}", slave.id))?;
            Ok(parsed.results)
        }
    });

    let joined = tokio::time::timeout(AGGREGATE_TIMEOUT, join_all(calls))
        .await
        .map_err(|_| "forward aggregation timed out".to_string())?;

    let mut all_results = Vec::new();
    for result in joined {
        all_results.extend(result?);
    }
    Ok(all_results)
}

fn bad_request(message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        kind: "RequestParameterInvalid".to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn internal_error(message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        kind: "ForwardFailed".to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
