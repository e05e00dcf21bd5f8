use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use f1api_auth::{AuthError, Permission};
use f1api_infra::RepoError;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/auth/login", post(login))
}

/// Registered for completeness; the login route itself is not gated.
pub fn permissions() -> Vec<Permission> {
    vec![Permission::new("/auth/login", "POST")]
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", e.body_text()),
    };

    let user = match services.users.find_by_username(&body.username).await {
        Ok(user) => user,
        Err(RepoError::NotFound) => {
            tracing::info!(username = %body.username, "login for unknown user");
            return invalid_credentials();
        }
        Err(e) => return errors::repo_error_to_response(e),
    };

    match services.hasher.verify_password(&body.password, &user.password_hash) {
        Ok(()) => {}
        Err(AuthError::PasswordMismatch) => {
            tracing::info!(user_id = %user.id, "login with wrong password");
            return invalid_credentials();
        }
        Err(e) => return errors::internal_error("verify_password", e),
    }

    match services.codec.issue(user.id.into()) {
        Ok(token) => (StatusCode::OK, Json(dto::TokenResponse { token })).into_response(),
        Err(e) => errors::internal_error("issue_token", e),
    }
}

fn invalid_credentials() -> axum::response::Response {
    errors::status_error(StatusCode::UNAUTHORIZED, "invalid_credentials")
}
