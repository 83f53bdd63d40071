//! Type-convert middleware (§4.8.2): for `POST /v1/check`, rewrite
//! `variables[name] = literal` into `variables[name] = { "@type":
//! <tag>, "value": literal }` using the schema to look up each name's
//! declared type. Runs downstream of the forward middleware, so by the
//! time it sees a batch every item's id is locally owned.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use open_ve_core::TaggedValue;

use crate::error::ErrorBody;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub async fn convert(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| bad_request(format!("failed to read request body: {e}")))?;

    let mut value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| bad_request(format!("invalid JSON body: {e}")))?;

    let Some(validations) = value.get_mut("validations").and_then(|v| v.as_array_mut()) else {
        return Err(bad_request("request body missing `validations` array"));
    };

    if validations.is_empty() {
        let request = Request::from_parts(parts, Body::from(bytes));
        return Ok(next.run(request).await);
    }

    let dsl = state
        .registrar
        .read()
        .await
        .map_err(|e| bad_request(format!("failed to load schema: {e}")))?;

    for item in validations.iter_mut() {
        let id = item
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| bad_request("validation item missing `id`"))?
            .to_string();

        let Some(unit) = dsl.find(&id) else {
            // unknown id (could be a forward-middleware bug, or a
            // client referencing an id that doesn't exist anywhere);
            // leave it untouched and let the handler surface NotFound.
            continue;
        };

        let Some(variables) = item.get_mut("variables").and_then(|v| v.as_object_mut()) else {
            continue;
        };

        for var in &unit.variables {
            if let Some(literal) = variables.get(&var.name).cloned() {
                if TaggedValue::from_json(var.var_type, &literal).is_none() {
                    return Err(bad_request(format!(
                        "variable `{}` in validation `{id}` is declared `{}` but the supplied literal does not match",
                        var.name,
                        var.var_type.as_str()
                    )));
                }
                let tag = TaggedValue::wire_tag_for(var.var_type);
                let wrapped = serde_json::json!({ "@type": tag, "value": literal });
                variables.insert(var.name.clone(), wrapped);
            }
        }

        for (name, _) in variables.clone() {
            if !unit.variables.iter().any(|v| v.name == name) {
                return Err(bad_request(format!(
                    "unknown variable type for `{name}` in validation `{id}`"
                )));
            }
        }
    }

    let rewritten =
        serde_json::to_vec(&value).map_err(|e| bad_request(format!("failed to re-encode body: {e}")))?;

    let request = Request::from_parts(parts, Body::from(rewritten));
    Ok(next.run(request).await)
}

fn bad_request(message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        kind: "RequestParameterInvalid".to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
