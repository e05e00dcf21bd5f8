use thiserror::Error;

/// Authentication failures raised by the token codec, the principal resolver
/// and the password hasher.
///
/// These carry the internal cause for logging; the HTTP layer collapses all of
/// them into a uniform 401.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token carries no principal")]
    MissingPrincipal,

    #[error("token principal is not a valid identifier: {0}")]
    MalformedPrincipal(String),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid token configuration: {0}")]
    Config(String),

    #[error("password does not match")]
    PasswordMismatch,

    #[error("password hashing failed: {0}")]
    Password(String),
}
