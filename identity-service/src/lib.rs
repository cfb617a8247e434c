//! # Atheneum - Identity Service
//!
//! Authentication, identity, and tenant-scoped user management for the
//! Atheneum learning platform. This crate is the single source of truth for
//! "who is this caller, in which tenant, with which role", and mediates
//! every credential-bearing operation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Transport (separate crate, out of scope)        │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ plain data in, plain data out
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │ AuthService              │  │ UserAdminService            │  │
//! │  │ register / login /       │  │ tenant-scoped CRUD,         │  │
//! │  │ refresh / verify /       │  │ verification and password   │  │
//! │  │ password lifecycle       │  │ overrides                   │  │
//! │  └──────────┬───────────────┘  └──────────┬──────────────────┘  │
//! └─────────────┼──────────────────────────────┼────────────────────┘
//!               │                              │
//!               ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Ports: IdentityStore (repository/), Mailer (email/),           │
//! │         PasswordHasher + AccessTokenIssuer (shared::auth)       │
//! │  Adapters: PgIdentityStore, InMemoryIdentityStore, SmtpMailer   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Service Operations
//!
//! | Operation | Service | Notes |
//! |-----------|---------|-------|
//! | Register / Login / Logout | [`AuthService`] | enumeration-safe login |
//! | Refresh access token | [`AuthService`] | no refresh rotation |
//! | Verify / resend verification | [`AuthService`] | verification is a latch |
//! | Forgot / reset / change password | [`AuthService`] | reset is single-use |
//! | Switch active role | [`AuthService`] | closed role set |
//! | Tenant-scoped user CRUD | [`UserAdminService`] | rule: null tenant is open |
//! | Verification & password overrides | [`UserAdminService`] | admin-only paths |
//!
//! ## Wiring Example
//!
//! ```rust,ignore
//! let config = AppConfig::from_env()?;
//! let pool = shared::database::create_pool(&config.database).await?;
//!
//! let store = Arc::new(PgIdentityStore::new(pool));
//! let hasher = Arc::new(PasswordHasher::new());
//! let issuer = Arc::new(AccessTokenIssuer::new(config.jwt.clone()));
//! let mailer: SharedMailer =
//!     Arc::new(SmtpMailer::new(config.smtp.clone(), config.token_expiry.clone())?);
//!
//! let auth = AuthService::new(store.clone(), hasher.clone(), issuer, mailer,
//!     config.token_expiry.clone());
//! let admin = UserAdminService::new(store, hasher);
//! ```
//!
//! The crate has no transport surface of its own; hosts bring their own
//! HTTP/RPC layer and map [`shared::errors::AuthError`] kinds to wire codes.

pub mod domain;
pub mod email;
pub mod repository;
pub mod service;

pub use domain::{User, UserProfile, UserRole};
pub use email::{Mailer, SharedMailer, SmtpMailer};
pub use repository::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
pub use service::{AuthService, UserAdminService};
