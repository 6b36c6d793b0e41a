//! `shopforge-auth` — authentication/authorization boundary.
//!
//! Token minting and account management live elsewhere; this crate only
//! validates bearer tokens and answers "may this principal do that". It is
//! intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256Validator, JwtValidator};
pub use permissions::{perms, Permission};
pub use principal::Principal;
pub use roles::Role;
