//! Postgres-backed store (feature `postgres`).
//!
//! ## Error Mapping
//!
//! | SQLx Error                   | PostgreSQL code | Result                               |
//! |------------------------------|-----------------|--------------------------------------|
//! | Database (unique violation)  | `23505`         | `Conflict` / `AlreadyExists{column}` |
//! | Database (foreign key)       | `23503`         | `PrincipalNotFound` / `NotFound`     |
//! | anything else                | any             | `Unavailable`                        |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use f1api_auth::{Permission, PermissionGroup, PermissionStore, PrincipalId, StoreError};
use f1api_core::{PermissionGroupId, PermissionId, UserId};

use super::{
    NewUser, PermissionCatalog, PermissionRecord, RepoError, UserFilter, UserRecord,
    UserRepository, UserUpdate,
};

/// Schema applied by [`PostgresStore::migrate`]. Idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          UUID PRIMARY KEY,
        username    VARCHAR(255) NOT NULL,
        email       VARCHAR(255) NOT NULL,
        password    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL,
        CONSTRAINT users_username_key UNIQUE (username),
        CONSTRAINT users_email_key UNIQUE (email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id        UUID PRIMARY KEY,
        endpoint  TEXT NOT NULL,
        method    TEXT NOT NULL,
        CONSTRAINT idx_endpoint_method UNIQUE (endpoint, method)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_permissions (
        user_id        UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        permission_id  UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permission_groups (
        id    UUID PRIMARY KEY,
        name  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permission_group_permissions (
        group_id       UUID NOT NULL REFERENCES permission_groups(id) ON DELETE CASCADE,
        permission_id  UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (group_id, permission_id)
    )
    "#,
];

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepoError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| RepoError::Unavailable(format!("connect: {e}")))?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_repo_error("migrate", e))?;
        }
        tracing::info!("postgres schema up to date");
        Ok(())
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map(|row| row.is_some())
    }

    async fn permission_uuid(&self, permission: &Permission) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query("SELECT id FROM permissions WHERE endpoint = $1 AND method = $2")
            .bind(permission.endpoint())
            .bind(permission.method())
            .fetch_optional(&*self.pool)
            .await?
            .map(|row| row.try_get::<Uuid, _>("id"))
            .transpose()
    }

    async fn group_permissions(&self, group_id: Uuid) -> Result<Vec<Permission>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.endpoint, p.method
            FROM permissions p
            JOIN permission_group_permissions gp ON gp.permission_id = p.id
            WHERE gp.group_id = $1
            ORDER BY p.endpoint, p.method
            "#,
        )
        .bind(group_id)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(permission_from_row).collect()
    }
}

#[async_trait]
impl PermissionStore for PostgresStore {
    async fn permissions_for(&self, principal_id: PrincipalId) -> Result<Vec<Permission>, StoreError> {
        let id = *principal_id.as_uuid();
        if !self
            .user_exists(id)
            .await
            .map_err(|e| map_store_error("permissions_for", e))?
        {
            return Err(StoreError::PrincipalNotFound);
        }

        let rows = sqlx::query(
            r#"
            SELECT p.endpoint, p.method
            FROM permissions p
            JOIN user_permissions up ON up.permission_id = p.id
            WHERE up.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_store_error("permissions_for", e))?;

        rows.iter()
            .map(permission_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_store_error("permissions_for", e))
    }

    async fn register(&self, permission: Permission) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO permissions (id, endpoint, method) VALUES ($1, $2, $3)")
            .bind(*PermissionId::new().as_uuid())
            .bind(permission.endpoint())
            .bind(permission.method())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(permission.to_string())
                } else {
                    map_store_error("register", e)
                }
            })?;
        Ok(())
    }

    async fn grant(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError> {
        let permission_id = self
            .permission_uuid(permission)
            .await
            .map_err(|e| map_store_error("grant", e))?
            .ok_or_else(|| StoreError::PermissionNotFound(permission.to_string()))?;

        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(*principal_id.as_uuid())
        .bind(permission_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_store_error("grant", e))?;
        Ok(())
    }

    async fn revoke(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError> {
        let id = *principal_id.as_uuid();
        if !self.user_exists(id).await.map_err(|e| map_store_error("revoke", e))? {
            return Err(StoreError::PrincipalNotFound);
        }
        let permission_id = self
            .permission_uuid(permission)
            .await
            .map_err(|e| map_store_error("revoke", e))?
            .ok_or_else(|| StoreError::PermissionNotFound(permission.to_string()))?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2")
            .bind(id)
            .bind(permission_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_store_error("revoke", e))?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, username, email, password, created_at, updated_at
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_repo_error("create_user", e))?;

        user_from_row(&row).map_err(|e| map_repo_error("create_user", e))
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, password, created_at, updated_at
            FROM users
            WHERE ($1::text IS NULL OR username = $1)
              AND ($2::text IS NULL OR email = $2)
              AND ($3::uuid IS NULL OR id = $3)
            ORDER BY created_at, id
            "#,
        )
        .bind(filter.username.as_deref())
        .bind(filter.email.as_deref())
        .bind(filter.id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_repo_error("list_users", e))?;

        rows.iter()
            .map(user_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_repo_error("list_users", e))
    }

    async fn get_user(&self, id: UserId) -> Result<UserRecord, RepoError> {
        let row = sqlx::query(
            "SELECT id, username, email, password, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_repo_error("get_user", e))?
        .ok_or(RepoError::NotFound)?;

        user_from_row(&row).map_err(|e| map_repo_error("get_user", e))
    }

    async fn find_by_username(&self, username: &str) -> Result<UserRecord, RepoError> {
        let row = sqlx::query(
            "SELECT id, username, email, password, created_at, updated_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_repo_error("find_by_username", e))?
        .ok_or(RepoError::NotFound)?;

        user_from_row(&row).map_err(|e| map_repo_error("find_by_username", e))
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, RepoError> {
        let row = sqlx::query(
            r#"
            UPDATE users SET
                username   = COALESCE($2, username),
                email      = COALESCE($3, email),
                password   = COALESCE($4, password),
                updated_at = $5
            WHERE id = $1
            RETURNING id, username, email, password, created_at, updated_at
            "#,
        )
        .bind(*id.as_uuid())
        .bind(update.username)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_repo_error("update_user", e))?
        .ok_or(RepoError::NotFound)?;

        user_from_row(&row).map_err(|e| map_repo_error("update_user", e))
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_repo_error("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionCatalog for PostgresStore {
    async fn permission_by_id(&self, id: PermissionId) -> Result<PermissionRecord, RepoError> {
        let row = sqlx::query("SELECT id, endpoint, method FROM permissions WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_repo_error("permission_by_id", e))?
            .ok_or(RepoError::NotFound)?;

        record_from_row(&row).map_err(|e| map_repo_error("permission_by_id", e))
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, RepoError> {
        let rows = sqlx::query("SELECT id, endpoint, method FROM permissions ORDER BY endpoint, method")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_repo_error("list_permissions", e))?;

        rows.iter()
            .map(record_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_repo_error("list_permissions", e))
    }

    async fn create_group(
        &self,
        name: &str,
        permissions: &[Permission],
    ) -> Result<PermissionGroup, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_repo_error("create_group", e))?;

        let id = PermissionGroupId::new();
        sqlx::query("INSERT INTO permission_groups (id, name) VALUES ($1, $2)")
            .bind(*id.as_uuid())
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_repo_error("create_group", e))?;

        for permission in permissions {
            let inserted = sqlx::query(
                r#"
                INSERT INTO permission_group_permissions (group_id, permission_id)
                SELECT $1, id FROM permissions WHERE endpoint = $2 AND method = $3
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(*id.as_uuid())
            .bind(permission.endpoint())
            .bind(permission.method())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_repo_error("create_group", e))?;

            // Zero rows means the permission was never registered; dropping tx rolls back.
            if inserted.rows_affected() == 0
                && self
                    .permission_uuid(permission)
                    .await
                    .map_err(|e| map_repo_error("create_group", e))?
                    .is_none()
            {
                return Err(RepoError::NotFound);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_repo_error("create_group", e))?;

        self.group(id).await
    }

    async fn group(&self, id: PermissionGroupId) -> Result<PermissionGroup, RepoError> {
        let row = sqlx::query("SELECT name FROM permission_groups WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_repo_error("group", e))?
            .ok_or(RepoError::NotFound)?;

        let name: String = row.try_get("name").map_err(|e| map_repo_error("group", e))?;
        let permissions = self
            .group_permissions(*id.as_uuid())
            .await
            .map_err(|e| map_repo_error("group", e))?;

        Ok(PermissionGroup {
            id,
            name,
            permissions,
        })
    }
}

fn permission_from_row(row: &PgRow) -> Result<Permission, sqlx::Error> {
    let endpoint: String = row.try_get("endpoint")?;
    let method: String = row.try_get("method")?;
    Ok(Permission::new(endpoint, method))
}

fn record_from_row(row: &PgRow) -> Result<PermissionRecord, sqlx::Error> {
    Ok(PermissionRecord {
        id: PermissionId::from_uuid(row.try_get("id")?),
        permission: permission_from_row(row)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_store_error(operation: &str, err: sqlx::Error) -> StoreError {
    tracing::error!(operation, error = %err, "permission store query failed");
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            StoreError::PrincipalNotFound
        }
        _ => StoreError::Unavailable(format!("{operation}: {err}")),
    }
}

fn map_repo_error(operation: &str, err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => {
                let column = match db_err.constraint() {
                    Some("users_username_key") => "username",
                    Some("users_email_key") => "email",
                    Some("idx_endpoint_method") => "permission",
                    _ => "record",
                };
                return RepoError::already_exists(column);
            }
            Some("23503") => return RepoError::NotFound,
            _ => {}
        }
    }

    tracing::error!(operation, error = %err, "user repository query failed");
    RepoError::Unavailable(format!("{operation}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
