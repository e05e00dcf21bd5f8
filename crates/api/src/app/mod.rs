//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage, token codec, gate construction and seeding
//! - `routes/`: HTTP routes + handlers (one file per area), each with its permission catalogue
//! - `dto.rs`: request/response DTOs and validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services, config.base_path()))
}

/// Assemble routes around already-built services.
///
/// Gated routes get `authorize` then `authenticate` as route layers, so
/// authentication runs first and both see the matched route.
pub fn router(services: Arc<AppServices>, base_path: &str) -> Router {
    let gate = services.gate.clone();

    let gated = routes::gated_router()
        .route_layer(axum::middleware::from_fn_with_state(
            gate.clone(),
            middleware::authorize,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            gate.clone(),
            middleware::authenticate,
        ));

    let authenticated_only = routes::authenticated_router().route_layer(
        axum::middleware::from_fn_with_state(gate, middleware::authenticate),
    );

    let api = Router::new()
        .merge(routes::public_router())
        .merge(gated)
        .merge(authenticated_only)
        .layer(Extension(services));

    let base_path = base_path.trim_end_matches('/');
    let root = Router::new().route("/health", get(routes::system::health));
    if base_path.is_empty() {
        root.merge(api)
    } else {
        root.nest(base_path, api)
    }
}
