//! Startup seeding: bootstrap administrator plus the route permission catalogue.

use serde::Deserialize;
use thiserror::Error;

use f1api_auth::{
    AuthError, PasswordHasher, Permission, PermissionStore, StoreError, store::register_idempotent,
};
use f1api_core::UserId;

use crate::store::{NewUser, RepoError, UserRecord, UserRepository};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seeding users failed: {0}")]
    Repo(#[from] RepoError),

    #[error("seeding permissions failed: {0}")]
    Store(#[from] StoreError),

    #[error("hashing admin password failed: {0}")]
    Password(#[from] AuthError),
}

/// Bootstrap administrator account.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub admin_email: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_email: "admin@localhost".to_string(),
        }
    }
}

impl std::fmt::Debug for SeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("admin_email", &self.admin_email)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_id: UserId,
    /// False when the administrator already existed.
    pub admin_created: bool,
    pub permissions: usize,
}

/// Ensure the administrator exists, register every catalogue permission and
/// grant all of them to the administrator.
///
/// Safe to run on every start: existing rows are reused.
pub async fn seed<U, S>(
    users: &U,
    permissions: &S,
    hasher: &PasswordHasher,
    config: &SeedConfig,
    catalogue: &[Permission],
) -> Result<SeedReport, SeedError>
where
    U: UserRepository + ?Sized,
    S: PermissionStore + ?Sized,
{
    let (admin, admin_created) = ensure_admin(users, hasher, config).await?;

    for permission in catalogue {
        register_idempotent(permissions, permission.clone()).await?;
        permissions.grant(admin.id.into(), permission).await?;
    }

    tracing::info!(
        admin = %admin.username,
        admin_created,
        permissions = catalogue.len(),
        "seed complete"
    );

    Ok(SeedReport {
        admin_id: admin.id,
        admin_created,
        permissions: catalogue.len(),
    })
}

async fn ensure_admin<U>(
    users: &U,
    hasher: &PasswordHasher,
    config: &SeedConfig,
) -> Result<(UserRecord, bool), SeedError>
where
    U: UserRepository + ?Sized,
{
    match users.find_by_username(&config.admin_username).await {
        Ok(existing) => return Ok((existing, false)),
        Err(RepoError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let new_user = NewUser {
        id: UserId::new(),
        username: config.admin_username.clone(),
        email: config.admin_email.clone(),
        password_hash: hasher.hash_password(&config.admin_password)?,
    };

    match users.create_user(new_user).await {
        Ok(created) => Ok((created, true)),
        // Another instance won the race.
        Err(RepoError::AlreadyExists { .. }) => {
            Ok((users.find_by_username(&config.admin_username).await?, false))
        }
        Err(e) => Err(e.into()),
    }
}
