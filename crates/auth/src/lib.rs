//! `tasklane-auth`: credentials, access tokens, and role checks.
//!
//! This crate is decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;

pub use authorize::{authorize, AuthzError};
pub use claims::{validate_claims, AccessClaims, TokenValidationError};
pub use password::PasswordHasher;
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
pub use token::{AuthError, Hs256JwtValidator, JwtValidator};
