//! `f1api-infra`: storage implementations and seeding.
//!
//! The authorization core only sees [`f1api_auth::PermissionStore`]; the HTTP
//! handlers additionally use [`UserRepository`] and [`PermissionCatalog`].

pub mod seed;
pub mod store;

pub use seed::{SeedConfig, SeedError, SeedReport, seed};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
pub use store::{
    InMemoryStore, NewUser, PermissionCatalog, PermissionRecord, RepoError, UserFilter,
    UserRecord, UserRepository, UserUpdate,
};
