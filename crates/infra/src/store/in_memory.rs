//! In-memory store for dev/tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use f1api_auth::{Permission, PermissionGroup, PermissionStore, PrincipalId, StoreError};
use f1api_core::{PermissionGroupId, PermissionId, UserId};

use super::{
    NewUser, PermissionCatalog, PermissionRecord, RepoError, UserFilter, UserRecord,
    UserRepository, UserUpdate,
};

const POISONED: &str = "in-memory store lock poisoned";

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    permissions: HashMap<PermissionId, Permission>,
    permission_keys: HashMap<Permission, PermissionId>,
    grants: HashMap<UserId, BTreeSet<PermissionId>>,
    groups: HashMap<PermissionGroupId, (String, BTreeSet<PermissionId>)>,
}

impl Tables {
    fn unique_user_clash(&self, id: UserId, username: &str, email: &str) -> Option<&'static str> {
        self.users.values().filter(|u| u.id != id).find_map(|u| {
            if u.username == username {
                Some("username")
            } else if u.email == email {
                Some("email")
            } else {
                None
            }
        })
    }

    fn permission_id(&self, permission: &Permission) -> Result<PermissionId, StoreError> {
        self.permission_keys
            .get(permission)
            .copied()
            .ok_or_else(|| StoreError::PermissionNotFound(permission.to_string()))
    }

    fn resolve(&self, ids: &BTreeSet<PermissionId>) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect()
    }
}

/// Users, permissions, grants and groups behind one `RwLock`.
///
/// Locks are held only for the duration of a map operation and never across
/// an `.await`, so readers are never parked behind a long write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, String> {
        self.inner.read().map_err(|_| POISONED.to_string())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, String> {
        self.inner.write().map_err(|_| POISONED.to_string())
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn permissions_for(&self, principal_id: PrincipalId) -> Result<Vec<Permission>, StoreError> {
        let tables = self.read().map_err(StoreError::Unavailable)?;
        let user_id = UserId::from(principal_id);

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::PrincipalNotFound);
        }

        Ok(tables
            .grants
            .get(&user_id)
            .map(|ids| tables.resolve(ids))
            .unwrap_or_default())
    }

    async fn register(&self, permission: Permission) -> Result<(), StoreError> {
        let mut tables = self.write().map_err(StoreError::Unavailable)?;

        if tables.permission_keys.contains_key(&permission) {
            return Err(StoreError::Conflict(permission.to_string()));
        }

        let id = PermissionId::new();
        tables.permission_keys.insert(permission.clone(), id);
        tables.permissions.insert(id, permission);
        Ok(())
    }

    async fn grant(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError> {
        let mut tables = self.write().map_err(StoreError::Unavailable)?;
        let user_id = UserId::from(principal_id);

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::PrincipalNotFound);
        }
        let permission_id = tables.permission_id(permission)?;

        tables.grants.entry(user_id).or_default().insert(permission_id);
        Ok(())
    }

    async fn revoke(&self, principal_id: PrincipalId, permission: &Permission) -> Result<(), StoreError> {
        let mut tables = self.write().map_err(StoreError::Unavailable)?;
        let user_id = UserId::from(principal_id);

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::PrincipalNotFound);
        }
        let permission_id = tables.permission_id(permission)?;

        if let Some(held) = tables.grants.get_mut(&user_id) {
            held.remove(&permission_id);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let mut tables = self.write().map_err(RepoError::Unavailable)?;

        if tables.users.contains_key(&user.id) {
            return Err(RepoError::already_exists("id"));
        }
        if let Some(column) = tables.unique_user_clash(user.id, &user.username, &user.email) {
            return Err(RepoError::already_exists(column));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRecord>, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        let mut users: Vec<UserRecord> = tables
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> Result<UserRecord, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        tables.users.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<UserRecord, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, RepoError> {
        let mut tables = self.write().map_err(RepoError::Unavailable)?;

        let current = tables.users.get(&id).cloned().ok_or(RepoError::NotFound)?;
        let username = update.username.unwrap_or(current.username);
        let email = update.email.unwrap_or(current.email);
        if let Some(column) = tables.unique_user_clash(id, &username, &email) {
            return Err(RepoError::already_exists(column));
        }

        let record = UserRecord {
            id,
            username,
            email,
            password_hash: update.password_hash.unwrap_or(current.password_hash),
            created_at: current.created_at,
            updated_at: Utc::now(),
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepoError> {
        let mut tables = self.write().map_err(RepoError::Unavailable)?;
        tables.users.remove(&id).ok_or(RepoError::NotFound)?;
        tables.grants.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PermissionCatalog for InMemoryStore {
    async fn permission_by_id(&self, id: PermissionId) -> Result<PermissionRecord, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        tables
            .permissions
            .get(&id)
            .map(|permission| PermissionRecord {
                id,
                permission: permission.clone(),
            })
            .ok_or(RepoError::NotFound)
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        let mut records: Vec<PermissionRecord> = tables
            .permissions
            .iter()
            .map(|(id, permission)| PermissionRecord {
                id: *id,
                permission: permission.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.permission.cmp(&b.permission));
        Ok(records)
    }

    async fn create_group(
        &self,
        name: &str,
        permissions: &[Permission],
    ) -> Result<PermissionGroup, RepoError> {
        let mut tables = self.write().map_err(RepoError::Unavailable)?;

        let members = permissions
            .iter()
            .map(|p| tables.permission_id(p).map_err(|_| RepoError::NotFound))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let id = PermissionGroupId::new();
        let group = PermissionGroup {
            id,
            name: name.to_string(),
            permissions: tables.resolve(&members),
        };
        tables.groups.insert(id, (group.name.clone(), members));
        Ok(group)
    }

    async fn group(&self, id: PermissionGroupId) -> Result<PermissionGroup, RepoError> {
        let tables = self.read().map_err(RepoError::Unavailable)?;
        let (name, members) = tables.groups.get(&id).ok_or(RepoError::NotFound)?;
        Ok(PermissionGroup {
            id,
            name: name.clone(),
            permissions: tables.resolve(members),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            id: UserId::new(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_principal_is_not_found() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.permissions_for(PrincipalId::new()).await,
            Err(StoreError::PrincipalNotFound)
        );
    }

    #[tokio::test]
    async fn known_principal_without_grants_has_empty_set() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("alice", "alice@example.com")).await.unwrap();

        assert_eq!(store.permissions_for(user.id.into()).await, Ok(vec![]));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_grants_stay_single() {
        let store = InMemoryStore::new();
        let admin = store.create_user(new_user("admin", "admin@example.com")).await.unwrap();
        let perm = Permission::new("/users", "GET");

        store.register(perm.clone()).await.unwrap();
        assert!(matches!(
            store.register(perm.clone()).await,
            Err(StoreError::Conflict(_))
        ));

        store.grant(admin.id.into(), &perm).await.unwrap();
        store.grant(admin.id.into(), &perm).await.unwrap();

        assert_eq!(store.permissions_for(admin.id.into()).await, Ok(vec![perm]));
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn grant_requires_registered_permission_and_known_principal() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("bob", "bob@example.com")).await.unwrap();
        let perm = Permission::new("/users", "POST");

        assert!(matches!(
            store.grant(user.id.into(), &perm).await,
            Err(StoreError::PermissionNotFound(_))
        ));

        store.register(perm.clone()).await.unwrap();
        assert_eq!(
            store.grant(PrincipalId::new(), &perm).await,
            Err(StoreError::PrincipalNotFound)
        );
    }

    #[tokio::test]
    async fn revoke_removes_grant() {
        let store = InMemoryStore::new();
        let user = store.create_user(new_user("carol", "carol@example.com")).await.unwrap();
        let perm = Permission::new("/users/:id", "DELETE");
        store.register(perm.clone()).await.unwrap();
        store.grant(user.id.into(), &perm).await.unwrap();

        store.revoke(user.id.into(), &perm).await.unwrap();
        assert_eq!(store.permissions_for(user.id.into()).await, Ok(vec![]));
    }

    #[tokio::test]
    async fn unique_username_and_email() {
        let store = InMemoryStore::new();
        store.create_user(new_user("dave", "dave@example.com")).await.unwrap();

        assert_eq!(
            store.create_user(new_user("dave", "other@example.com")).await,
            Err(RepoError::already_exists("username"))
        );
        assert_eq!(
            store.create_user(new_user("other", "dave@example.com")).await,
            Err(RepoError::already_exists("email"))
        );
    }

    #[tokio::test]
    async fn update_keeps_unset_fields_and_checks_uniqueness() {
        let store = InMemoryStore::new();
        let erin = store.create_user(new_user("erin", "erin@example.com")).await.unwrap();
        store.create_user(new_user("frank", "frank@example.com")).await.unwrap();

        let updated = store
            .update_user(
                erin.id,
                UserUpdate {
                    email: Some("erin@new.example.com".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "erin");
        assert_eq!(updated.email, "erin@new.example.com");
        assert_eq!(updated.password_hash, erin.password_hash);

        assert_eq!(
            store
                .update_user(
                    erin.id,
                    UserUpdate {
                        username: Some("frank".into()),
                        ..UserUpdate::default()
                    },
                )
                .await,
            Err(RepoError::already_exists("username"))
        );
    }

    #[tokio::test]
    async fn delete_drops_grants_and_principal() {
        let store = InMemoryStore::new();
        let gina = store.create_user(new_user("gina", "gina@example.com")).await.unwrap();
        let perm = Permission::new("/users", "GET");
        store.register(perm.clone()).await.unwrap();
        store.grant(gina.id.into(), &perm).await.unwrap();

        store.delete_user(gina.id).await.unwrap();
        assert_eq!(
            store.permissions_for(gina.id.into()).await,
            Err(StoreError::PrincipalNotFound)
        );
        assert_eq!(store.delete_user(gina.id).await, Err(RepoError::NotFound));
    }

    #[tokio::test]
    async fn list_users_applies_filters() {
        let store = InMemoryStore::new();
        let hank = store.create_user(new_user("hank", "hank@example.com")).await.unwrap();
        store.create_user(new_user("ivy", "ivy@example.com")).await.unwrap();

        assert_eq!(store.list_users(&UserFilter::default()).await.unwrap().len(), 2);

        let by_email = UserFilter {
            email: Some("hank@example.com".into()),
            ..UserFilter::default()
        };
        assert_eq!(store.list_users(&by_email).await.unwrap(), vec![hank.clone()]);

        let mismatched = UserFilter {
            username: Some("ivy".into()),
            id: Some(hank.id),
            ..UserFilter::default()
        };
        assert!(store.list_users(&mismatched).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn groups_are_inert_collections() {
        let store = InMemoryStore::new();
        let read = Permission::new("/users", "GET");
        let write = Permission::new("/users", "POST");
        store.register(read.clone()).await.unwrap();
        store.register(write.clone()).await.unwrap();

        let group = store.create_group("user-admins", &[read.clone(), write.clone()]).await.unwrap();
        let fetched = store.group(group.id).await.unwrap();
        assert_eq!(fetched.name, "user-admins");
        assert_eq!(fetched.permissions.len(), 2);

        assert_eq!(
            store.create_group("broken", &[Permission::new("/nope", "GET")]).await,
            Err(RepoError::NotFound)
        );
    }

    #[tokio::test]
    async fn permission_lookup_by_id() {
        let store = InMemoryStore::new();
        let perm = Permission::new("/users/:id/permissions", "GET");
        store.register(perm.clone()).await.unwrap();

        let listed = store.list_permissions().await.unwrap();
        let record = store.permission_by_id(listed[0].id).await.unwrap();
        assert_eq!(record.permission, perm);
        assert_eq!(
            store.permission_by_id(PermissionId::new()).await,
            Err(RepoError::NotFound)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_yields_one_row() {
        let store = Arc::new(InMemoryStore::new());
        let perm = Permission::new("/users", "GET");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let perm = perm.clone();
                tokio::spawn(async move { store.register(perm).await })
            })
            .collect();

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    }
}
