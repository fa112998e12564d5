//! Authentication service: registration, login, refresh-token rotation,
//! and logout orchestration.
//!
//! Credential lifecycle: Anonymous -> Authenticated (access + refresh
//! issued) -> Refreshed (rotated) -> Revoked (logout). Every denial maps
//! to one generic wire error; the precise reason is logged here and
//! preserved on the error for tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::db::{Database, Role, User};
use crate::error::{DenyReason, ServiceError};
use crate::jwt::{JwtConfig, generate_refresh_token};
use crate::password;

/// Default refresh token lifetime in days.
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;

/// Settings blob given to new accounts.
const DEFAULT_SETTINGS: &str = r#"{"currency":"EUR","language":"en","timezone":"UTC"}"#;

/// A role as seen by API consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub is_system: bool,
}

impl From<Role> for RoleView {
    fn from(role: Role) -> Self {
        Self {
            id: role.uuid,
            code: role.code,
            name: role.name,
            description: role.description,
            permissions: role.permissions,
            is_system: role.is_system,
        }
    }
}

/// A user as seen by API consumers. Never carries the password digest
/// or internal row IDs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: String,
    pub last_login_at: Option<String>,
    pub settings: serde_json::Value,
    pub roles: Vec<RoleView>,
}

/// Result of a successful register/login/refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

/// Orchestrates the password hasher, token issuer, refresh token store
/// and role resolver behind the four auth operations.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    jwt: Arc<JwtConfig>,
    refresh_token_days: i64,
}

impl AuthService {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, refresh_token_days: i64) -> Self {
        Self {
            db,
            jwt,
            refresh_token_days,
        }
    }

    /// Register a new account and immediately log it in, so registration
    /// observably ends with an authenticated session.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        phone: &str,
    ) -> Result<AuthResponse, ServiceError> {
        if self.db.users().email_exists(email).await? {
            return Err(ServiceError::Conflict("user with this email".into()));
        }

        let password_hash = password::hash_password(password)?;
        let uuid = Uuid::new_v4().to_string();

        // User row and default role assignment commit together.
        self.db
            .users()
            .create_with_role(
                &uuid,
                email,
                &password_hash,
                full_name,
                phone,
                DEFAULT_SETTINGS,
                "USER",
            )
            .await?;

        self.login(email, password).await
    }

    /// Authenticate with email + password and issue a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ServiceError> {
        let Some(user) = self.db.users().get_by_email(email).await? else {
            return Err(deny(DenyReason::UnknownEmail));
        };
        if !user.is_active {
            return Err(deny(DenyReason::InactiveAccount));
        }
        if !password::verify_password(password, &user.password_hash)? {
            return Err(deny(DenyReason::BadPassword));
        }

        let (user_view, access) = self.issue_access(&user).await?;

        let refresh_token = generate_refresh_token();
        let expires = Utc::now() + Duration::days(self.refresh_token_days);
        self.db
            .tokens()
            .create(user.id, &refresh_token, expires)
            .await?;

        self.db.users().touch_last_login(user.id).await?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token,
            expires_at: access.expires_at,
            user: user_view,
        })
    }

    /// Exchange a live refresh token for a new token pair.
    ///
    /// The presented token is consumed: it is revoked and replaced in one
    /// transaction, after the new access token has been minted. Two
    /// concurrent calls with the same token resolve to exactly one winner;
    /// the loser gets the same generic denial as a revoked token.
    pub async fn refresh(&self, presented: &str) -> Result<AuthResponse, ServiceError> {
        let Some(record) = self.db.tokens().find(presented).await? else {
            return Err(deny(DenyReason::TokenNotFound));
        };
        if record.revoked_at.is_some() {
            return Err(deny(DenyReason::TokenRevoked));
        }
        if record.expires_at <= Utc::now() {
            return Err(deny(DenyReason::TokenExpired));
        }

        // A missing owner row only happens after account deletion, which
        // cascades over tokens; treat it like a deactivated account.
        let Some(user) = self.db.users().get_by_id(record.user_id).await? else {
            return Err(deny(DenyReason::InactiveAccount));
        };
        if !user.is_active {
            return Err(deny(DenyReason::InactiveAccount));
        }

        let (user_view, access) = self.issue_access(&user).await?;

        let replacement = generate_refresh_token();
        let expires = Utc::now() + Duration::days(self.refresh_token_days);
        let rotated = self
            .db
            .tokens()
            .rotate(presented, user.id, &replacement, expires)
            .await?;
        if !rotated {
            return Err(deny(DenyReason::RotationLost));
        }

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: replacement,
            expires_at: access.expires_at,
            user: user_view,
        })
    }

    /// Revoke a refresh token (logout). Idempotent: an absent or
    /// already-revoked token returns false, never an error.
    pub async fn revoke_token(&self, token: &str) -> Result<bool, ServiceError> {
        Ok(self.db.tokens().revoke(token).await?)
    }

    /// Resolve the identity from a validated access token back to the
    /// current user record. Claims are a point-in-time cache: role
    /// membership is re-read from the store here.
    pub async fn current_user(&self, user_uuid: &str) -> Result<UserView, ServiceError> {
        let Some(user) = self.db.users().get_by_uuid(user_uuid).await? else {
            return Err(ServiceError::NotFound("user".into()));
        };
        if !user.is_active {
            return Err(deny(DenyReason::InactiveAccount));
        }
        self.user_view(&user).await
    }

    /// Build the public view of a user, roles included.
    pub async fn user_view(&self, user: &User) -> Result<UserView, ServiceError> {
        let roles = self.db.roles().roles_of(user.id).await?;
        Ok(UserView {
            id: user.uuid.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at.clone(),
            last_login_at: user.last_login_at.clone(),
            settings: serde_json::from_str(&user.settings)
                .unwrap_or_else(|_| serde_json::json!({})),
            roles: roles.into_iter().map(RoleView::from).collect(),
        })
    }

    /// Mint an access token from the user's current roles and the
    /// deduplicated union of their permissions. Pure computation after
    /// the role lookup; no writes.
    async fn issue_access(
        &self,
        user: &User,
    ) -> Result<(UserView, crate::jwt::AccessTokenResult), ServiceError> {
        let user_view = self.user_view(user).await?;

        let role_codes: Vec<String> = user_view.roles.iter().map(|r| r.code.clone()).collect();
        let permissions: Vec<String> = user_view
            .roles
            .iter()
            .flat_map(|r| r.permissions.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let display_name = if user.full_name.is_empty() {
            user.email.as_str()
        } else {
            user.full_name.as_str()
        };

        let access = self
            .jwt
            .issue_access_token(
                &user.uuid,
                &user.email,
                display_name,
                role_codes,
                permissions,
            )
            .map_err(|e| ServiceError::Crypto(e.to_string()))?;

        Ok((user_view, access))
    }
}

fn deny(reason: DenyReason) -> ServiceError {
    warn!(reason = reason.as_str(), "authentication denied");
    ServiceError::Unauthorized(reason)
}
