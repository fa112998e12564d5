//! Request authentication: principal extraction and role/permission gates.
//!
//! Inbound requests carry a short-lived access token in an httpOnly
//! cookie. The extractor validates it statelessly and exposes a
//! [`Principal`] with the identity, role and permission claims baked in
//! at issuance time. Endpoints gate by role through the typed
//! [`Auth`] extractor or by permission through
//! [`Principal::has_permission`].

mod cookie;
mod errors;
mod extractors;
mod principal;
mod state;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, auth_cookie, clear_cookie, get_cookie};
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyUser, Auth, RoleGate, StaffOnly};
pub use principal::Principal;
pub use state::HasAuthBackend;
