//! `f1api-auth`: request authentication and route authorization.
//!
//! This crate is decoupled from HTTP and storage: the HTTP layer feeds it
//! credentials and matched routes, and storage plugs in through
//! [`PermissionStore`].

pub mod authorize;
pub mod claims;
pub mod error;
pub mod gate;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod store;
pub mod token;

pub use authorize::AuthorizationEngine;
pub use claims::Claims;
pub use error::AuthError;
pub use gate::{GateOutcome, GateRequest, Rejection, RequestGate, extract_credential};
pub use password::PasswordHasher;
pub use permissions::{Permission, PermissionGroup, route_matches};
pub use principal::{PrincipalId, extract_principal};
pub use store::{PermissionStore, StoreError};
pub use token::{TokenCodec, TokenConfig};
