//! User and permission storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use f1api_auth::{Permission, PermissionGroup};
use f1api_core::{PermissionGroupId, PermissionId, UserId};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,

    /// A unique column (username, email, permission key) already holds the value.
    #[error("{column} already exists")]
    AlreadyExists { column: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    pub fn already_exists(column: impl Into<String>) -> Self {
        Self::AlreadyExists {
            column: column.into(),
        }
    }
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; never rendered into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for account creation. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Equality filters for listing users. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    pub username: Option<String>,
    pub email: Option<String>,
    pub id: Option<UserId>,
}

impl UserFilter {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.id.is_none()
    }

    pub fn matches(&self, user: &UserRecord) -> bool {
        self.username.as_ref().is_none_or(|u| *u == user.username)
            && self.email.as_ref().is_none_or(|e| *e == user.email)
            && self.id.is_none_or(|id| id == user.id)
    }
}

/// Stored permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: PermissionId,
    #[serde(flatten)]
    pub permission: Permission,
}

/// User account persistence used by the HTTP handlers.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`RepoError::AlreadyExists`] naming the clashing column.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepoError>;

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRecord>, RepoError>;

    async fn get_user(&self, id: UserId) -> Result<UserRecord, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<UserRecord, RepoError>;

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, RepoError>;

    /// Removes the account and its permission grants.
    async fn delete_user(&self, id: UserId) -> Result<(), RepoError>;
}

/// Administrative lookups over registered permissions and groups.
#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    async fn permission_by_id(&self, id: PermissionId) -> Result<PermissionRecord, RepoError>;

    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, RepoError>;

    /// Every listed permission must already be registered.
    async fn create_group(
        &self,
        name: &str,
        permissions: &[Permission],
    ) -> Result<PermissionGroup, RepoError>;

    async fn group(&self, id: PermissionGroupId) -> Result<PermissionGroup, RepoError>;
}
