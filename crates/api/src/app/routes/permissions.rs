use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use f1api_auth::Permission;
use f1api_core::PermissionId;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/permissions/:id", get(get_permission))
}

pub fn permissions() -> Vec<Permission> {
    vec![Permission::new("/permissions/:id", "GET")]
}

/// GET /permissions/:id
pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PermissionId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid permission id");
        }
    };

    match services.catalog.permission_by_id(id).await {
        Ok(record) => (StatusCode::OK, Json(dto::PermissionResponse::from(record))).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}
