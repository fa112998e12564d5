//! Authentication state trait and macro.

use crate::jwt::JwtConfig;

/// Trait for router state types that can authenticate requests.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn secure_cookies(&self) -> bool;
}

/// Implement [`HasAuthBackend`] for a state struct with the standard
/// `jwt: Arc<JwtConfig>` and `secure_cookies: bool` fields.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
