//! Gate middleware.
//!
//! `authenticate` and `authorize` are separate stages so a route can require a
//! valid token without a permission check (`/whoami`). Both are attached with
//! `route_layer`, which makes the matched route template available.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Query, Request, State},
    http::{Method, StatusCode, Uri, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use f1api_auth::{Rejection, RequestGate};

use crate::app::errors::status_error;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Validate the bearer credential and attach a [`PrincipalContext`].
pub async fn authenticate(
    State(gate): State<Arc<RequestGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let query_token = query_token(req.uri());
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match gate.authenticate(query_token.as_deref(), authorization) {
        Ok(principal_id) => {
            req.extensions_mut().insert(PrincipalContext::new(principal_id));
            next.run(req).await
        }
        Err(rejection) => rejection_response(rejection),
    }
}

/// Check the authenticated principal against the matched route and method.
///
/// Must run after [`authenticate`].
pub async fn authorize(
    State(gate): State<Arc<RequestGate>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(principal) = req.extensions().get::<PrincipalContext>().copied() else {
        tracing::error!("authorize stage ran without an authenticated principal");
        return rejection_response(Rejection::Unauthenticated);
    };

    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let method = permission_method(req.method()).to_owned();
    let decision = gate
        .authorize(principal.principal_id(), &route, &method)
        .await;

    match decision {
        Ok(()) => next.run(req).await,
        Err(rejection) => rejection_response(rejection),
    }
}

/// Method checked against stored permissions. axum serves `HEAD` with the
/// `GET` handler, so it needs the `GET` grant.
fn permission_method(method: &Method) -> &str {
    if *method == Method::HEAD {
        "GET"
    } else {
        method.as_str()
    }
}

fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// Fixed bodies; the cause is only logged.
pub fn rejection_response(rejection: Rejection) -> Response {
    match rejection {
        Rejection::Unauthenticated | Rejection::InvalidToken => {
            status_error(StatusCode::UNAUTHORIZED, "unauthorized")
        }
        Rejection::Forbidden => status_error(StatusCode::FORBIDDEN, "forbidden"),
        Rejection::Unavailable => status_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    }
}
