use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, PrincipalId};

/// Claim set carried by an identity token.
///
/// Produced by [`crate::TokenCodec`] and validated once at decode time, so
/// downstream code reads typed fields instead of probing a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Always `true` for tokens minted at login.
    #[serde(default)]
    pub authorized: bool,

    /// Principal identifier. An absent claim decodes as the empty string and
    /// is rejected by [`crate::extract_principal`].
    #[serde(default)]
    pub user_id: String,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Fails when `issued_at + lifetime_hours` is not a representable instant.
    pub fn new(
        principal_id: PrincipalId,
        issued_at: DateTime<Utc>,
        lifetime_hours: u32,
    ) -> Result<Self, AuthError> {
        let expires_at = Duration::try_hours(i64::from(lifetime_hours))
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Config(format!("token lifetime of {lifetime_hours}h overflows the clock"))
            })?;

        Ok(Self {
            authorized: true,
            user_id: principal_id.to_string(),
            exp: expires_at.timestamp(),
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// A token stays valid through the second named by `exp`; no leeway.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_lifetime_expires_after_the_issuing_second() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let claims = Claims::new(PrincipalId::new(), now, 0).unwrap();

        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn missing_principal_claim_decodes_as_empty() {
        let claims: Claims = serde_json::from_str(r#"{"exp": 10}"#).unwrap();
        assert!(claims.user_id.is_empty());
        assert!(!claims.authorized);
    }

    #[test]
    fn expires_at_reflects_lifetime() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let claims = Claims::new(PrincipalId::new(), now, 24).unwrap();
        assert_eq!(claims.expires_at(), Some(now + Duration::hours(24)));
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(matches!(
            Claims::new(PrincipalId::new(), now, u32::MAX),
            Err(AuthError::Config(_))
        ));
    }
}
