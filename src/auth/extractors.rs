//! Axum extractors for authentication and role gating.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{AuthError, AuthErrorKind};
use super::principal::Principal;
use super::state::HasAuthBackend;

/// A role constraint checked after the token validates.
pub trait RoleGate {
    fn allows(principal: &Principal) -> bool;
}

/// No role requirement; any authenticated user passes.
pub struct AnyUser;

impl RoleGate for AnyUser {
    fn allows(_principal: &Principal) -> bool {
        true
    }
}

/// Administrator-level access.
pub struct AdminOnly;

impl RoleGate for AdminOnly {
    fn allows(principal: &Principal) -> bool {
        principal.has_any_role(&["SUPER_ADMIN", "ADMIN"])
    }
}

/// Administrator or manager access (read-mostly admin surfaces).
pub struct StaffOnly;

impl RoleGate for StaffOnly {
    fn allows(principal: &Principal) -> bool {
        principal.has_any_role(&["SUPER_ADMIN", "ADMIN", "MANAGER"])
    }
}

/// Extractor that authenticates the request from the access token
/// cookie and applies a role gate.
///
/// - `Auth` - any authenticated user
/// - `Auth<AdminOnly>` - SUPER_ADMIN or ADMIN
/// - `Auth<StaffOnly>` - SUPER_ADMIN, ADMIN or MANAGER
///
/// Missing/invalid tokens are 401 with cleared cookies; a failed role
/// gate is 403 with cookies intact.
pub struct Auth<G = AnyUser> {
    pub principal: Principal,
    _gate: PhantomData<G>,
}

impl<S, G> FromRequestParts<S> for Auth<G>
where
    S: HasAuthBackend + Send + Sync,
    G: RoleGate + Send,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secure = state.secure_cookies();

        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
            .ok_or_else(|| AuthError::new(AuthErrorKind::NotAuthenticated, secure))?;

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| AuthError::new(AuthErrorKind::InvalidToken, secure))?;

        // An unusable subject claim is unauthorized, never anonymous.
        let principal = Principal::from_claims(claims)
            .ok_or_else(|| AuthError::new(AuthErrorKind::InvalidToken, secure))?;

        if !G::allows(&principal) {
            return Err(AuthError::new(AuthErrorKind::InsufficientRole, secure));
        }

        Ok(Auth {
            principal,
            _gate: PhantomData,
        })
    }
}
