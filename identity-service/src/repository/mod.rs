//! # Identity Store Port
//!
//! Persistence port for the identity core. The trait defines WHAT the
//! services need; adapters define HOW:
//!
//! - [`PgIdentityStore`](postgres::PgIdentityStore): PostgreSQL adapter (sqlx)
//! - [`InMemoryIdentityStore`](memory::InMemoryIdentityStore): in-process
//!   adapter backing the test suite
//!
//! The store is the only component permitted to touch durable storage, and
//! its surface is deliberately narrow: single-entity CRUD plus the few
//! composite reads the services need. Per-statement atomicity is the only
//! persistence contract; the conditional `mark_reset_token_used` is the one
//! compare-and-set primitive the services rely on for race detection.
//!
//! ## Cancellation
//!
//! Every operation is an async method; cancellation and deadlines propagate
//! by dropping the future. A cancellation that lands after a statement
//! commits leaves that write in place (at-least-once semantics).
//!
//! ## Query Patterns (PostgreSQL adapter)
//!
//! ```text
//! ┌───────────────────┬──────────────────────────────────────────────────┐
//! │ Pattern           │ Example                                          │
//! ├───────────────────┼──────────────────────────────────────────────────┤
//! │ CI email lookup   │ WHERE LOWER(email) = LOWER($1)                   │
//! │ Conditional flip  │ UPDATE ... SET used_at = NOW()                   │
//! │                   │   WHERE id = $1 AND used_at IS NULL              │
//! │ Returning         │ INSERT ... RETURNING * (to get generated fields) │
//! │ Parameterized     │ Always $1, $2 (never string interpolation)       │
//! └───────────────────┴──────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::AuthResult;
use uuid::Uuid;

use crate::domain::{
    NewUser, PasswordResetToken, RefreshToken, TenantMembership, User, UserFilter,
    VerificationToken,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// Persistence port for users, the three token families, and memberships.
///
/// Implementations must uphold:
///
/// 1. **Case-insensitive email uniqueness** across users; `create_user` and
///    `update_user` surface a collision as `AuthError::EmailAlreadyExists`
///    (the services' pre-checks are an optimisation, not a guarantee).
/// 2. **Tenant isolation in listings**: when `filter.tenant_id` is set, no
///    row bound to a different tenant may be returned.
/// 3. **Single-statement atomicity** for every operation, including the
///    bulk revokes and the conditional mark-used.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    // =========================================================================
    // USER OPERATIONS
    // =========================================================================

    /// Inserts a new user and returns the stored row.
    ///
    /// A concurrent insert with the same email (any casing) must fail with
    /// `AuthError::EmailAlreadyExists`.
    async fn create_user(&self, new_user: NewUser) -> AuthResult<User>;

    /// Finds a user by id.
    async fn find_user_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Finds a user by email, case-insensitively.
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Persists the given user state, replacing the stored row.
    ///
    /// Fails with `AuthError::UserNotFound` when the row is gone and
    /// `AuthError::EmailAlreadyExists` on an email collision.
    async fn update_user(&self, user: &User) -> AuthResult<User>;

    /// Deletes a user row. Owned token rows cascade at the storage level.
    async fn delete_user(&self, id: Uuid) -> AuthResult<()>;

    /// Lists users matching the filter, newest first, with 1-based
    /// pagination. Returns the page and the total matching count.
    async fn list_users(
        &self,
        filter: &UserFilter,
        page: u32,
        page_size: u32,
    ) -> AuthResult<(Vec<User>, i64)>;

    /// Batch-fetches users by id. Missing ids are silently skipped.
    async fn find_users_by_ids(&self, ids: &[Uuid]) -> AuthResult<Vec<User>>;

    /// Counts users matching the filter.
    async fn count_users(&self, filter: &UserFilter) -> AuthResult<i64>;

    /// Whether any user holds this email (case-insensitive).
    async fn email_exists(&self, email: &str) -> AuthResult<bool>;

    /// Whether any user other than `user_id` holds this email. Used for
    /// profile email changes.
    async fn email_exists_excluding(&self, email: &str, user_id: Uuid) -> AuthResult<bool>;

    // =========================================================================
    // VERIFICATION TOKEN OPERATIONS
    // =========================================================================

    /// Persists a new email-verification token.
    async fn create_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<VerificationToken>;

    /// Looks a verification token up by its opaque string.
    async fn find_verification_token(&self, token: &str) -> AuthResult<Option<VerificationToken>>;

    /// Deletes one verification token (consumption cleanup).
    async fn delete_verification_token(&self, id: Uuid) -> AuthResult<()>;

    /// Deletes all verification tokens owned by a user. Returns the count.
    async fn delete_verification_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64>;

    // =========================================================================
    // RESET TOKEN OPERATIONS
    // =========================================================================

    /// Persists a new password-reset token.
    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<PasswordResetToken>;

    /// Looks a reset token up by its opaque string.
    async fn find_reset_token(&self, token: &str) -> AuthResult<Option<PasswordResetToken>>;

    /// Stamps `used_at` iff the token is still unused.
    ///
    /// Returns `true` when this call consumed the token, `false` when a
    /// concurrent consumer got there first. Single-statement compare-and-set.
    async fn mark_reset_token_used(&self, id: Uuid) -> AuthResult<bool>;

    /// Deletes one reset token.
    async fn delete_reset_token(&self, id: Uuid) -> AuthResult<()>;

    /// Deletes all reset tokens owned by a user. Returns the count.
    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64>;

    // =========================================================================
    // REFRESH TOKEN OPERATIONS
    // =========================================================================

    /// Persists a new refresh token.
    async fn create_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshToken>;

    /// Looks a refresh token up by its opaque string, whatever its state.
    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>>;

    /// Stamps `revoked_at` on one token. Idempotent in effect.
    async fn revoke_refresh_token(&self, id: Uuid) -> AuthResult<()>;

    /// Revokes every active refresh token of a user in one statement.
    /// Returns the number revoked.
    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Deletes refresh tokens past their expiry (janitor sweep). Returns
    /// the number deleted.
    async fn delete_expired_refresh_tokens(&self) -> AuthResult<u64>;

    // =========================================================================
    // MEMBERSHIP OPERATIONS
    // =========================================================================

    /// Returns the user's first active membership, if any. Used to resolve
    /// a tenant at login when the user row itself has no tenant binding.
    async fn first_active_membership(&self, user_id: Uuid) -> AuthResult<Option<TenantMembership>>;
}
