//! Error taxonomy for the auth core and its consumers.

use thiserror::Error;

/// Why a credential check was denied.
///
/// Every variant collapses to the same generic wire response so callers
/// cannot probe which sub-condition failed; the variant itself is logged
/// and asserted on in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No active user with that email.
    UnknownEmail,
    /// Password verification failed.
    BadPassword,
    /// The account exists but is deactivated.
    InactiveAccount,
    /// Refresh token string not present in the store.
    TokenNotFound,
    /// Refresh token was revoked (logout or earlier rotation).
    TokenRevoked,
    /// Refresh token past its expiry.
    TokenExpired,
    /// A concurrent refresh rotated the token first.
    RotationLost,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::UnknownEmail => "unknown email",
            DenyReason::BadPassword => "bad password",
            DenyReason::InactiveAccount => "inactive account",
            DenyReason::TokenNotFound => "token not found",
            DenyReason::TokenRevoked => "token revoked",
            DenyReason::TokenExpired => "token expired",
            DenyReason::RotationLost => "lost rotation race",
        }
    }
}

/// Errors produced by the auth service and the stores beneath it.
///
/// The HTTP boundary maps each kind to exactly one status code; nothing
/// in the core formats a response itself.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Resource already exists (duplicate email or role code).
    #[error("{0} already exists")]
    Conflict(String),

    /// Credentials or token rejected. Uniform on the wire.
    #[error("unauthorized: {}", .0.as_str())]
    Unauthorized(DenyReason),

    /// Referenced entity is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Attempted mutation of a protected entity.
    #[error("{0}")]
    InvalidOperation(String),

    /// Password hashing/verification failure (malformed digest).
    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    /// The internal denial reason, if this is an authorization failure.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            ServiceError::Unauthorized(reason) => Some(*reason),
            _ => None,
        }
    }
}
