use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use validator::ValidationErrors;

use f1api_infra::RepoError;

pub fn repo_error_to_response(err: RepoError) -> axum::response::Response {
    match err {
        RepoError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        RepoError::AlreadyExists { column } => {
            json_error(StatusCode::CONFLICT, "conflict", format!("{column} already exists"))
        }
        RepoError::Unavailable(msg) => {
            tracing::error!(error = %msg, "storage unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", "storage unavailable")
        }
    }
}

pub fn validation_error_to_response(err: ValidationErrors) -> axum::response::Response {
    let fields = err
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .collect::<Vec<_>>();
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": err.to_string(),
            "fields": fields,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Error body carrying only the code, for responses that must not leak a cause.
pub fn status_error(status: StatusCode, code: &'static str) -> axum::response::Response {
    (status, axum::Json(json!({ "error": code }))).into_response()
}

pub fn internal_error(context: &'static str, err: impl std::fmt::Display) -> axum::response::Response {
    tracing::error!(context, error = %err, "internal error");
    status_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
}
