//! Route-level authorization decisions.

use std::sync::Arc;

use crate::{PermissionStore, PrincipalId, StoreError};

/// Decides whether a principal may invoke a (route, method) pair.
///
/// Matching is existence-based: the first held permission that covers the
/// request allows it. See [`crate::Permission::allows`].
#[derive(Clone)]
pub struct AuthorizationEngine {
    store: Arc<dyn PermissionStore>,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    /// Allow/deny with every failure folded into deny.
    pub async fn is_allowed(&self, principal_id: PrincipalId, route: &str, method: &str) -> bool {
        match self.decide(principal_id, route, method).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!(%principal_id, route, method, error = %e, "authorization lookup failed; denying");
                false
            }
        }
    }

    /// Allow/deny, surfacing only [`StoreError::Unavailable`].
    ///
    /// An unknown principal is indistinguishable from one without rights.
    pub async fn decide(
        &self,
        principal_id: PrincipalId,
        route: &str,
        method: &str,
    ) -> Result<bool, StoreError> {
        let permissions = match self.store.permissions_for(principal_id).await {
            Ok(permissions) => permissions,
            Err(StoreError::PrincipalNotFound) => {
                tracing::debug!(%principal_id, "principal not found; denying");
                return Ok(false);
            }
            Err(e @ StoreError::Unavailable(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(%principal_id, error = %e, "unexpected store error; denying");
                return Ok(false);
            }
        };

        let allowed = permissions.iter().any(|p| p.allows(route, method));
        tracing::debug!(%principal_id, route, method, allowed, held = permissions.len(), "authorization decision");
        Ok(allowed)
    }
}

impl std::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngine").finish_non_exhaustive()
    }
}
