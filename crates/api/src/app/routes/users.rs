use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use validator::Validate;

use f1api_auth::{Permission, StoreError};
use f1api_core::UserId;
use f1api_infra::{NewUser, UserFilter, UserUpdate};

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/permissions", get(user_permissions))
}

pub fn permissions() -> Vec<Permission> {
    vec![
        Permission::new("/users", "GET"),
        Permission::new("/users", "POST"),
        Permission::new("/users/:id", "GET"),
        Permission::new("/users/:id", "PUT"),
        Permission::new("/users/:id", "DELETE"),
        Permission::new("/users/:id/permissions", "GET"),
    ]
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub username: Option<String>,
    pub email: Option<String>,
    pub id: Option<String>,
}

/// GET /users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListUsersQuery>,
) -> axum::response::Response {
    let id = match query.id.as_deref().map(str::parse::<UserId>).transpose() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"),
    };
    let filter = UserFilter {
        username: query.username,
        email: query.email,
        id,
    };

    match services.users.list_users(&filter).await {
        Ok(users) if users.is_empty() => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "no users found")
        }
        Ok(users) => {
            let items = users
                .into_iter()
                .map(dto::UserResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::repo_error_to_response(e),
    }
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", e.body_text()),
    };
    if let Err(e) = body.validate() {
        return errors::validation_error_to_response(e);
    }

    let password_hash = match services.hasher.hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => return errors::internal_error("hash_password", e),
    };

    let new_user = NewUser {
        id: UserId::new(),
        username: body.username,
        email: body.email,
        password_hash,
    };

    match services.users.create_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user created");
            (StatusCode::CREATED, Json(dto::UserResponse::from(user))).into_response()
        }
        Err(e) => errors::repo_error_to_response(e),
    }
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users.get_user(id).await {
        Ok(user) => (StatusCode::OK, Json(dto::UserResponse::from(user))).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

/// PUT /users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", e.body_text()),
    };
    if let Err(e) = body.validate() {
        return errors::validation_error_to_response(e);
    }

    let password_hash = match body.password.as_deref().map(|p| services.hasher.hash_password(p)) {
        None => None,
        Some(Ok(hash)) => Some(hash),
        Some(Err(e)) => return errors::internal_error("hash_password", e),
    };

    let update = UserUpdate {
        username: body.username,
        email: body.email,
        password_hash,
    };

    match services.users.update_user(id, update).await {
        Ok(user) => (StatusCode::OK, Json(dto::UserResponse::from(user))).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.users.delete_user(id).await {
        Ok(()) => {
            tracing::info!(user_id = %id, "user deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::repo_error_to_response(e),
    }
}

/// GET /users/:id/permissions
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.permissions.permissions_for(id.into()).await {
        Ok(held) if held.is_empty() => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "user has no permissions")
        }
        Ok(mut held) => {
            held.sort();
            let items = held
                .into_iter()
                .map(dto::PermissionResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(StoreError::PrincipalNotFound) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found")
        }
        Err(StoreError::Unavailable(msg)) => {
            tracing::error!(error = %msg, "permission store unavailable");
            errors::status_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
        Err(e) => errors::internal_error("permissions_for", e),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}
