//! HTTP/JSON gateway (§4.8): the axum router, its CORS/forward/
//! type-convert middleware stack, and the handlers that bridge into
//! `open-ve-service`.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build as build_router;
pub use state::{AppState, Mode};
