//! Identity token issue and validation (HS256 JWT).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{AuthError, Claims, PrincipalId};

/// Signing secrets shorter than this are accepted with a warning.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Upper bound on token lifetime (100 years).
pub const MAX_LIFETIME_HOURS: u32 = 100 * 366 * 24;

/// Token codec configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC signing secret.
    #[serde(skip_serializing)]
    pub secret: String,

    /// Lifetime of issued tokens in hours. `0` yields tokens that expire at the
    /// end of the issuing second.
    pub lifetime_hours: u32,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, lifetime_hours: u32) -> Self {
        Self {
            secret: secret.into(),
            lifetime_hours,
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::Config("signing secret is not configured".into()));
        }
        if self.lifetime_hours > MAX_LIFETIME_HOURS {
            return Err(AuthError::Config(format!(
                "token lifetime {}h exceeds {MAX_LIFETIME_HOURS}h",
                self.lifetime_hours
            )));
        }
        if self.secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = self.secret.len(),
                "token signing secret is shorter than recommended ({RECOMMENDED_SECRET_LEN} bytes)"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("lifetime_hours", &self.lifetime_hours)
            .finish()
    }
}

/// Creates and validates signed, time-limited identity tokens.
///
/// Pure apart from reading the clock in [`TokenCodec::issue`] and
/// [`TokenCodec::validate`]; the `_at` variants take the clock explicitly.
#[derive(Clone)]
pub struct TokenCodec {
    lifetime_hours: u32,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    inspection: Arc<Validation>,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Result<Self, AuthError> {
        config.validate()?;

        // Expiry is checked by hand against an injected clock, with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let mut inspection = Validation::new(Algorithm::HS256);
        inspection.insecure_disable_signature_validation();
        inspection.validate_exp = false;
        inspection.validate_aud = false;
        inspection.set_required_spec_claims(&["exp"]);

        Ok(Self {
            lifetime_hours: config.lifetime_hours,
            encoding_key: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            validation: Arc::new(validation),
            inspection: Arc::new(inspection),
        })
    }

    pub fn lifetime_hours(&self) -> u32 {
        self.lifetime_hours
    }

    /// Issue a token for `principal_id` valid for the configured lifetime.
    pub fn issue(&self, principal_id: PrincipalId) -> Result<String, AuthError> {
        self.issue_at(principal_id, Utc::now())
    }

    pub fn issue_at(
        &self,
        principal_id: PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims::new(principal_id, now, self.lifetime_hours)?;
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Decode and verify a token against the current time.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Decode and verify a token.
    ///
    /// Expiry is evaluated before the signature: a token past `exp` reports
    /// [`AuthError::Expired`] whichever key signed it.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let unverified = decode::<Claims>(token, &self.decoding_key, &self.inspection)
            .map_err(|e| AuthError::Malformed(e.to_string()))?
            .claims;

        if unverified.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed(e.to_string()),
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("lifetime_hours", &self.lifetime_hours)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn codec(lifetime_hours: u32) -> TokenCodec {
        TokenCodec::new(TokenConfig::new(SECRET, lifetime_hours)).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn issue_then_validate_yields_same_principal() {
        let codec = codec(24);
        let principal = PrincipalId::new();

        let token = codec.issue(principal).unwrap();
        let claims = codec.validate(&token).unwrap();

        assert!(claims.authorized);
        assert_eq!(crate::extract_principal(&claims), Ok(principal));
    }

    #[test]
    fn zero_lifetime_token_is_expired_one_second_later() {
        let codec = codec(0);
        let now = fixed_now();
        let token = codec.issue_at(PrincipalId::new(), now).unwrap();

        assert!(codec.validate_at(&token, now).is_ok());
        assert_eq!(
            codec.validate_at(&token, now + Duration::seconds(1)),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let issuer = TokenCodec::new(TokenConfig::new("secret-one-for-testing-purposes", 1)).unwrap();
        let verifier = TokenCodec::new(TokenConfig::new("secret-two-for-testing-purposes", 1)).unwrap();

        let token = issuer.issue(PrincipalId::new()).unwrap();
        assert_eq!(verifier.validate(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn expired_token_reports_expired_even_with_foreign_signature() {
        let issuer = TokenCodec::new(TokenConfig::new("secret-one-for-testing-purposes", 0)).unwrap();
        let verifier = codec(1);
        let now = fixed_now();

        let token = issuer.issue_at(PrincipalId::new(), now).unwrap();
        assert_eq!(
            verifier.validate_at(&token, now + Duration::hours(1)),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec(1);
        assert!(matches!(codec.validate("invalid.token.here"), Err(AuthError::Malformed(_))));
        assert!(matches!(codec.validate(""), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn tampered_payload_is_invalid_signature() {
        let codec = codec(1);
        let token = codec.issue(PrincipalId::new()).unwrap();
        let forged_claims = Claims::new(PrincipalId::new(), Utc::now(), 1).unwrap();
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(b"attacker"),
        )
        .unwrap();

        // Splice the forged payload onto the genuine signature.
        let mut genuine = token.split('.');
        let mut fake = forged.split('.');
        let spliced = format!(
            "{}.{}.{}",
            genuine.next().unwrap(),
            fake.nth(1).unwrap(),
            genuine.nth(1).unwrap()
        );
        assert_eq!(codec.validate(&spliced), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            TokenCodec::new(TokenConfig::new("", 1)),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn oversized_lifetime_is_rejected_at_construction() {
        assert!(matches!(
            TokenCodec::new(TokenConfig::new(SECRET, 3_000_000_000)),
            Err(AuthError::Config(_))
        ));
        assert!(TokenCodec::new(TokenConfig::new(SECRET, MAX_LIFETIME_HOURS)).is_ok());
    }

    #[test]
    fn longest_allowed_lifetime_still_issues() {
        let codec = codec(MAX_LIFETIME_HOURS);
        let token = codec.issue(PrincipalId::new()).unwrap();
        assert!(codec.validate(&token).is_ok());
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", TokenConfig::new(SECRET, 1));
        assert!(!rendered.contains(SECRET));
    }

    proptest! {
        #[test]
        fn round_trip_before_expiry(lifetime in 0u32..=720, offset_secs in 0i64..3600) {
            let codec = codec(lifetime);
            let principal = PrincipalId::new();
            let now = fixed_now();
            let token = codec.issue_at(principal, now).unwrap();

            let within = offset_secs.min(i64::from(lifetime) * 3600);
            let claims = codec.validate_at(&token, now + Duration::seconds(within)).unwrap();
            prop_assert_eq!(crate::extract_principal(&claims), Ok(principal));
        }

        #[test]
        fn always_expired_past_exp(lifetime in 0u32..=720, past in 1i64..100_000) {
            let codec = codec(lifetime);
            let now = fixed_now();
            let token = codec.issue_at(PrincipalId::new(), now).unwrap();

            let after = now + Duration::hours(i64::from(lifetime)) + Duration::seconds(past);
            prop_assert_eq!(codec.validate_at(&token, after), Err(AuthError::Expired));
        }
    }
}
