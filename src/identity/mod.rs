//! Identity resolution and permission checks.
//!
//! A bearer JWT is validated (signature + expiry) and its embedded
//! identity extracted fresh on every request; nothing here is cached or
//! persisted. Permission checks scan the identity's ordered grant list.

pub mod claims;
pub mod permission;
pub mod resolver;

pub use claims::{Identity, Permission, RegisteredClaims, VerifiedClaims, ALL, ANY};
pub use permission::check_permission;
pub use resolver::{AuthError, IdentityResolver};
