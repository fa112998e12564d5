//! JWT access token issuance and validation, plus opaque refresh token
//! generation.
//!
//! Access tokens are short-lived (15 minutes), stateless, and carry the
//! full identity/role/permission claim set. Refresh tokens are random
//! opaque strings tracked in the database for revocation and rotation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 15;

/// Refresh token entropy: 64 random bytes before base64 encoding.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Display name
    pub name: String,
    /// Assigned role codes
    pub roles: Vec<String>,
    /// Union of permission strings across all assigned roles
    pub permissions: Vec<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The signed JWT string
    pub token: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

/// Configuration for JWT operations, built once at startup.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_token_minutes: i64,
}

impl JwtConfig {
    pub fn new(secret: &[u8], issuer: &str, audience: &str, access_token_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_token_minutes,
        }
    }

    /// Issue a signed HS256 access token for a user.
    ///
    /// The role and permission claims are a point-in-time snapshot:
    /// membership changes after issuance are not reflected until the
    /// token is refreshed.
    pub fn issue_access_token(
        &self,
        user_uuid: &str,
        email: &str,
        name: &str,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Result<AccessTokenResult, JwtError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.access_token_minutes);

        let claims = AccessClaims {
            sub: user_uuid.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            roles,
            permissions,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult { token, expires_at })
    }

    /// Validate signature, issuer, audience and expiry of an access token.
    /// Validation is strict: no clock-skew leeway is tolerated.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);

        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Decoding(e),
            })
    }
}

/// Generate a cryptographically random opaque refresh token
/// (64 bytes, base64url-encoded without padding).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, issuer, audience, shape)
    Decoding(jsonwebtoken::errors::Error),
    /// Token is past its expiry
    Expired,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::Expired => write!(f, "Token has expired"),
        }
    }
}

impl std::error::Error for JwtError {}
