//! The request-scoped identity decoded from a validated access token.

use std::collections::BTreeSet;

use crate::db::WILDCARD_PERMISSION;
use crate::jwt::AccessClaims;

/// Identity and authorization context for one request.
///
/// Built only from a token that passed signature/expiry validation, and
/// only when the subject claim parsed; there is no anonymous principal.
/// Role and permission sets reflect the moment the token was issued.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Public user ID (UUID string from the `sub` claim).
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Build a principal from validated claims. Returns `None` when the
    /// subject claim is missing or blank; callers must treat that as
    /// unauthorized, never as an anonymous-but-permitted identity.
    pub fn from_claims(claims: AccessClaims) -> Option<Self> {
        if claims.sub.trim().is_empty() {
            return None;
        }
        Some(Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            roles: claims.roles.into_iter().collect(),
            permissions: claims.permissions.into_iter().collect(),
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.roles.contains(*role))
    }

    /// Point permission check over the claims snapshot: the wildcard or
    /// an exact match grants.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD_PERMISSION) || self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, roles: &[&str], permissions: &[&str]) -> AccessClaims {
        AccessClaims {
            sub: sub.to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            iss: "finchbook".to_string(),
            aud: "finchbook-web".to_string(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        assert!(Principal::from_claims(claims("", &[], &[])).is_none());
        assert!(Principal::from_claims(claims("   ", &[], &[])).is_none());
        assert!(Principal::from_claims(claims("uuid-1", &[], &[])).is_some());
    }

    #[test]
    fn test_wildcard_permission() {
        let p = Principal::from_claims(claims("uuid-1", &["SUPER_ADMIN"], &["*"])).unwrap();
        assert!(p.has_permission("users.manage"));
        assert!(p.has_permission("anything.at.all"));
    }

    #[test]
    fn test_point_permission() {
        let p = Principal::from_claims(claims("uuid-1", &["MANAGER"], &["reports.view"])).unwrap();
        assert!(p.has_permission("reports.view"));
        assert!(!p.has_permission("users.manage"));
    }

    #[test]
    fn test_role_checks() {
        let p = Principal::from_claims(claims("uuid-1", &["ADMIN", "USER"], &[])).unwrap();
        assert!(p.has_role("ADMIN"));
        assert!(!p.has_role("MANAGER"));
        assert!(p.has_any_role(&["MANAGER", "USER"]));
        assert!(!p.has_any_role(&["MANAGER", "SUPER_ADMIN"]));
    }
}
