//! Storage seam for principal permissions.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Permission, PrincipalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("principal not found")]
    PrincipalNotFound,

    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    /// The (endpoint, method) pair is already registered. Registration callers
    /// treat this as success.
    #[error("permission already registered: {0}")]
    Conflict(String),

    #[error("permission store unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for which principal holds which permissions.
///
/// Implementations must be safe for concurrent reads while registrations are
/// in flight, and a read must never wait indefinitely on a writer.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// All permissions held by `principal_id`, without duplicates.
    ///
    /// Fails with [`StoreError::PrincipalNotFound`] for an unknown principal;
    /// a known principal without grants yields an empty vec.
    async fn permissions_for(&self, principal_id: PrincipalId) -> Result<Vec<Permission>, StoreError>;

    /// Register a permission. Returns [`StoreError::Conflict`] when the
    /// (endpoint, method) pair already exists.
    async fn register(&self, permission: Permission) -> Result<(), StoreError>;

    /// Associate a registered permission with a principal. Granting twice is a no-op.
    async fn grant(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError>;

    /// Remove an association. Revoking a permission that was not held is a no-op.
    async fn revoke(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError>;
}

/// Register a permission, folding [`StoreError::Conflict`] into success.
pub async fn register_idempotent<S>(store: &S, permission: Permission) -> Result<(), StoreError>
where
    S: PermissionStore + ?Sized,
{
    match store.register(permission).await {
        Ok(()) | Err(StoreError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::FixtureStore;
    use super::*;

    #[tokio::test]
    async fn register_idempotent_swallows_conflict() {
        let store = FixtureStore::default();
        let perm = Permission::new("/users", "GET");

        register_idempotent(&store, perm.clone()).await.unwrap();
        assert!(matches!(store.register(perm.clone()).await, Err(StoreError::Conflict(_))));
        register_idempotent(&store, perm).await.unwrap();
    }
}
