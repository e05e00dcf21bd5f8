use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use f1api_auth::Permission;
use f1api_core::{PermissionId, UserId};
use f1api_infra::{PermissionRecord, UserRecord};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 4, max = 255), custom(function = "validate_alphanumeric"))]
    pub username: String,

    #[validate(email, length(max = 255))]
    pub email: String,

    #[validate(length(min = 8, max = 255))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 4, max = 255), custom(function = "validate_alphanumeric"))]
    pub username: Option<String>,

    #[validate(email, length(max = 255))]
    pub email: Option<String>,

    #[validate(length(min = 8, max = 255))]
    pub password: Option<String>,
}

fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("alphanumeric"));
    }
    Ok(())
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub id: Option<PermissionId>,
    pub endpoint: String,
    pub method: String,
}

impl From<PermissionRecord> for PermissionResponse {
    fn from(record: PermissionRecord) -> Self {
        Self {
            id: Some(record.id),
            ..Self::from(record.permission)
        }
    }
}

impl From<Permission> for PermissionResponse {
    fn from(permission: Permission) -> Self {
        Self {
            id: None,
            endpoint: permission.endpoint().to_string(),
            method: permission.method().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(username: &str, email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_user() {
        create("alice42", "alice@example.com", "password1").validate().unwrap();
    }

    #[test]
    fn rejects_short_or_symbolic_username() {
        assert!(create("bob", "bob@example.com", "password1").validate().is_err());
        assert!(create("bob_smith", "bob@example.com", "password1").validate().is_err());
    }

    #[test]
    fn rejects_bad_email_and_short_password() {
        let err = create("carol1", "not-an-email", "short").validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("username"));
    }

    #[test]
    fn update_validates_only_present_fields() {
        UpdateUserRequest::default().validate().unwrap();
        let update = UpdateUserRequest {
            username: Some("x!".to_string()),
            ..UpdateUserRequest::default()
        };
        assert!(update.validate().is_err());
    }
}
