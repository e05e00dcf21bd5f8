//! Per-request authentication and authorization pipeline.
//!
//! The gate runs token validation, principal extraction and the route
//! decision in order, and stops at the first failure:
//!
//! ```text
//! Unauthenticated --credential--> TokenPresent --valid--> TokenValid
//!     --principal--> PrincipalKnown --allowed--> Forwarded
//! ```
//!
//! Every other edge ends in `Rejected`. The HTTP layer runs the two halves as
//! separate middleware stages so a route can skip authorization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{AuthorizationEngine, PrincipalId, StoreError, TokenCodec, extract_principal};

/// Why a request was stopped at the gate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("no credential supplied")]
    Unauthenticated,

    #[error("credential is invalid")]
    InvalidToken,

    #[error("principal may not invoke this route")]
    Forbidden,

    #[error("permission store unavailable")]
    Unavailable,
}

/// Terminal state of one gate execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Forwarded(PrincipalId),
    Rejected(Rejection),
}

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a str,
    /// Matched route template, including the routing base prefix.
    pub route: &'a str,
    /// Value of the `token` query parameter.
    pub query_token: Option<&'a str>,
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
}

/// Pick the bearer credential out of the query parameter or the header.
///
/// The query parameter wins when both are present. A `Bearer ` prefix on the
/// header is stripped; any other non-blank header value is used verbatim.
pub fn extract_credential<'a>(
    query_token: Option<&'a str>,
    authorization: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token);
    }

    let header = authorization?.trim_start();
    let token = match header.strip_prefix("Bearer") {
        // "Bearer" followed by whitespace or nothing; "Bearerx" is a raw token.
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => header.trim_end(),
    };
    (!token.is_empty()).then_some(token)
}

#[derive(Clone, Debug)]
pub struct RequestGate {
    codec: Arc<TokenCodec>,
    engine: AuthorizationEngine,
    base_path: String,
}

impl RequestGate {
    pub fn new(codec: Arc<TokenCodec>, engine: AuthorizationEngine, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self {
            codec,
            engine,
            base_path,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Run the whole pipeline.
    pub async fn evaluate(&self, request: &GateRequest<'_>) -> GateOutcome {
        self.evaluate_at(request, Utc::now()).await
    }

    pub async fn evaluate_at(&self, request: &GateRequest<'_>, now: DateTime<Utc>) -> GateOutcome {
        let principal_id = match self.authenticate_at(request.query_token, request.authorization, now) {
            Ok(principal_id) => principal_id,
            Err(rejection) => return GateOutcome::Rejected(rejection),
        };

        match self.authorize(principal_id, request.route, request.method).await {
            Ok(()) => GateOutcome::Forwarded(principal_id),
            Err(rejection) => GateOutcome::Rejected(rejection),
        }
    }

    /// Authentication stage: credential → validated token → principal.
    pub fn authenticate(
        &self,
        query_token: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<PrincipalId, Rejection> {
        self.authenticate_at(query_token, authorization, Utc::now())
    }

    pub fn authenticate_at(
        &self,
        query_token: Option<&str>,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PrincipalId, Rejection> {
        let Some(token) = extract_credential(query_token, authorization) else {
            tracing::debug!("no bearer credential on request");
            return Err(Rejection::Unauthenticated);
        };

        let claims = self.codec.validate_at(token, now).map_err(|e| {
            tracing::warn!(error = %e, "token rejected");
            Rejection::InvalidToken
        })?;

        extract_principal(&claims).map_err(|e| {
            tracing::warn!(error = %e, "token principal rejected");
            Rejection::InvalidToken
        })
    }

    /// Authorization stage for an already-authenticated principal.
    ///
    /// `route` is the matched route template; the base prefix is stripped
    /// before comparing against stored endpoint templates.
    pub async fn authorize(
        &self,
        principal_id: PrincipalId,
        route: &str,
        method: &str,
    ) -> Result<(), Rejection> {
        let route = self.logical_route(route);
        match self.engine.decide(principal_id, route, method).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::info!(%principal_id, route, method, "forbidden");
                Err(Rejection::Forbidden)
            }
            Err(StoreError::Unavailable(reason)) => {
                tracing::error!(%principal_id, route, method, %reason, "permission store unavailable");
                Err(Rejection::Unavailable)
            }
            Err(e) => {
                tracing::warn!(%principal_id, error = %e, "authorization failed");
                Err(Rejection::Forbidden)
            }
        }
    }

    /// Route with the routing base prefix removed (`/api/v1/users` → `/users`).
    pub fn logical_route<'r>(&self, route: &'r str) -> &'r str {
        if self.base_path.is_empty() {
            return route;
        }
        match route.strip_prefix(self.base_path.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => route,
        }
    }
}
