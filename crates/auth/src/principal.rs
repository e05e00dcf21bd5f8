use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use f1api_core::UserId;

use crate::{AuthError, Claims};

/// Identity of an authenticated principal (a user account).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl From<UserId> for PrincipalId {
    fn from(value: UserId) -> Self {
        Self(*value.as_uuid())
    }
}

impl From<PrincipalId> for UserId {
    fn from(value: PrincipalId) -> Self {
        UserId::from_uuid(value.0)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Read the principal out of already-validated claims.
///
/// Does not re-check signature or expiry.
pub fn extract_principal(claims: &Claims) -> Result<PrincipalId, AuthError> {
    let raw = claims.user_id.trim();
    if raw.is_empty() {
        return Err(AuthError::MissingPrincipal);
    }

    raw.parse()
        .map_err(|e: uuid::Error| AuthError::MalformedPrincipal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with(user_id: &str) -> Claims {
        Claims {
            authorized: true,
            user_id: user_id.to_string(),
            exp: 0,
        }
    }

    #[test]
    fn extracts_principal_from_claims() {
        let id = PrincipalId::new();
        assert_eq!(extract_principal(&claims_with(&id.to_string())), Ok(id));
    }

    #[test]
    fn empty_principal_is_missing() {
        assert_eq!(
            extract_principal(&claims_with("")),
            Err(AuthError::MissingPrincipal)
        );
        assert_eq!(
            extract_principal(&claims_with("   ")),
            Err(AuthError::MissingPrincipal)
        );
    }

    #[test]
    fn non_uuid_principal_is_malformed() {
        assert!(matches!(
            extract_principal(&claims_with("admin")),
            Err(AuthError::MalformedPrincipal(_))
        ));
    }

    #[test]
    fn converts_to_and_from_user_id() {
        let user = UserId::new();
        let principal = PrincipalId::from(user);
        assert_eq!(UserId::from(principal), user);
    }
}
