//! # Authentication Primitives
//!
//! Crypto-adjacent building blocks shared by the identity services:
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`jwt`] | Access-token minting and validation | [`AccessTokenIssuer`], [`Claims`] |
//! | [`password`] | Argon2id hashing with input bounds | [`PasswordHasher`] |
//! | [`opaque`] | High-entropy opaque token strings | [`new_opaque_token`](opaque::new_opaque_token) |
//!
//! Access tokens are stateless JWTs; the opaque tokens produced here back
//! the stateful, revocable families (refresh, verification, reset) that the
//! identity store persists.

pub mod jwt;
pub mod opaque;
pub mod password;

pub use jwt::{AccessTokenClaims, AccessTokenIssuer, Claims};
pub use password::PasswordHasher;
