//! `custodia-auth`: authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it turns a bearer token into
//! a `Principal`, maps school roles to permissions and hashes passwords.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::{Permission, permissions_for_role};
pub use principal::Principal;
pub use roles::Role;
