//! Router assembly (§4.8): CORS wraps everything; `POST /v1/check`
//! additionally layers the forward middleware (outermost, master-only
//! no-op on a slave) and the type-convert middleware (innermost, right
//! before the handler).

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::middleware::{cors, forward, type_convert};
use crate::state::AppState;

pub fn build(state: AppState, cors_origins: &[String], cors_headers: &[String]) -> Router {
    let check_route = Router::new()
        .route("/v1/check", post(handlers::check))
        .layer(from_fn_with_state(state.clone(), type_convert::convert))
        .layer(from_fn_with_state(state.clone(), forward::forward));

    Router::new()
        .merge(check_route)
        .route("/v1/dsl/register", post(handlers::register))
        .route("/v1/dsl", get(handlers::read_dsl))
        .route("/v1/slave/register", post(handlers::slave_register))
        .route("/healthz", get(handlers::healthz))
        .layer(cors::build(cors_origins, cors_headers))
        .with_state(state)
}
