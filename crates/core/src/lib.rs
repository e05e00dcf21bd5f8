//! `f1api-core`: shared building blocks (identifiers and their parse error).
//!
//! This crate has no infrastructure or transport concerns.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{PermissionGroupId, PermissionId, UserId};
