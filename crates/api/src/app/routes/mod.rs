use axum::{Router, routing::get};

use f1api_auth::Permission;

pub mod auth;
pub mod permissions;
pub mod system;
pub mod users;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    auth::router()
}

/// Routes behind both gate stages.
pub fn gated_router() -> Router {
    Router::new()
        .merge(users::router())
        .merge(permissions::router())
}

/// Routes that need a valid token but no permission.
pub fn authenticated_router() -> Router {
    Router::new().route("/whoami", get(system::whoami))
}

/// Every permission a route module declares, registered at seeding.
pub fn permission_catalogue() -> Vec<Permission> {
    let mut catalogue = Vec::new();
    catalogue.extend(auth::permissions());
    catalogue.extend(users::permissions());
    catalogue.extend(permissions::permissions());
    catalogue
}
