//! CORS (§4.8.1): origins and headers from config; methods
//! `GET/POST/PATCH/PUT/DELETE/OPTIONS`; max-age 300 s; credentials
//! allowed.

use axum::http::{HeaderName, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn build(allowed_origins: &[String], allowed_headers: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers(headers)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(300))
}
