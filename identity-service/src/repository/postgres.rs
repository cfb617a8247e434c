//! # PostgreSQL Store Adapter
//!
//! sqlx-backed implementation of [`IdentityStore`].
//!
//! ## Error Handling
//!
//! Database errors are converted to [`AuthError`] variants:
//!
//! | sqlx error | AuthError variant |
//! |------------------------|-------------------------|
//! | Unique constraint | `EmailAlreadyExists` |
//! | Zero rows on update | `UserNotFound` |
//! | Other | `Query` (store category) |
//!
//! ## Schema
//!
//! See `migrations/0001_identity_schema.sql`. Token tables reference
//! `users(id)` with `ON DELETE CASCADE`, which backs the cascade-delete
//! ownership rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::{AuthError, AuthResult};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    NewUser, PasswordResetToken, RefreshToken, TenantMembership, User, UserFilter,
    VerificationToken,
};
use crate::repository::IdentityStore;

/// PostgreSQL adapter for the identity store port.
///
/// # Thread Safety
///
/// `PgIdentityStore` is `Send + Sync` because `PgPool` internally uses
/// `Arc`. Cloning is cheap and safe across async tasks.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    /// PostgreSQL connection pool
    pool: PgPool,
}

impl PgIdentityStore {
    /// Creates a new adapter over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Maps an insert/update error, surfacing email-uniqueness collisions
    /// as their own kind.
    fn map_unique_violation(e: sqlx::Error) -> AuthError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return AuthError::EmailAlreadyExists;
            }
        }
        AuthError::Query(e)
    }

    /// Appends the WHERE clauses for a [`UserFilter`] onto a query builder.
    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
        if let Some(tenant_id) = filter.tenant_id {
            qb.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role);
        }
        if let Some(is_verified) = filter.is_verified {
            qb.push(" AND is_verified = ").push_bind(is_verified);
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR full_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    // =========================================================================
    // USER OPERATIONS
    // =========================================================================

    async fn create_user(&self, new_user: NewUser) -> AuthResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                tenant_id, email, password_hash, full_name, role, is_verified
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_user.tenant_id)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.full_name)
        .bind(new_user.role)
        .bind(new_user.is_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_unique_violation)?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> AuthResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET tenant_id = $1,
                email = $2,
                password_hash = $3,
                full_name = $4,
                role = $5,
                is_verified = $6,
                is_locked = $7,
                is_disabled = $8,
                force_password_change = $9,
                updated_at = $10
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_verified)
        .bind(user.is_locked)
        .bind(user.is_disabled)
        .bind(user.force_password_change)
        .bind(user.updated_at)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_unique_violation)?;

        updated.ok_or(AuthError::UserNotFound)
    }

    async fn delete_user(&self, id: Uuid) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: u32,
        page_size: u32,
    ) -> AuthResult<(Vec<User>, i64)> {
        let limit = page_size as i64;
        let offset = (page.saturating_sub(1) as i64) * limit;

        let mut qb = QueryBuilder::new("SELECT * FROM users WHERE TRUE");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let users = qb.build_query_as::<User>().fetch_all(&self.pool).await?;

        let total = self.count_users(filter).await?;

        Ok((users, total))
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> AuthResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users WHERE id = ANY($1) ORDER BY created_at DESC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count_users(&self, filter: &UserFilter) -> AuthResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
        Self::push_filter(&mut qb, filter);

        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(total)
    }

    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    async fn email_exists_excluding(&self, email: &str, user_id: Uuid) -> AuthResult<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users
            WHERE LOWER(email) = LOWER($1) AND id <> $2
            "#,
        )
        .bind(email)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    // =========================================================================
    // VERIFICATION TOKEN OPERATIONS
    // =========================================================================

    async fn create_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<VerificationToken> {
        let row = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_verification_token(&self, token: &str) -> AuthResult<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationToken>(
            r#"
            SELECT * FROM verification_tokens WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_verification_token(&self, id: Uuid) -> AuthResult<()> {
        sqlx::query(
            r#"
            DELETE FROM verification_tokens WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_verification_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM verification_tokens WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // RESET TOKEN OPERATIONS
    // =========================================================================

    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<PasswordResetToken> {
        let row = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_reset_token(&self, token: &str) -> AuthResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT * FROM password_reset_tokens WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> AuthResult<bool> {
        // Compare-and-set: only the first consumer sees rows_affected = 1
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE id = $1 AND used_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_reset_token(&self, id: Uuid) -> AuthResult<()> {
        sqlx::query(
            r#"
            DELETE FROM password_reset_tokens WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_reset_tokens WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // REFRESH TOKEN OPERATIONS
    // =========================================================================

    async fn create_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshToken> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT * FROM refresh_tokens WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> AuthResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_refresh_tokens(&self) -> AuthResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // MEMBERSHIP OPERATIONS
    // =========================================================================

    async fn first_active_membership(
        &self,
        user_id: Uuid,
    ) -> AuthResult<Option<TenantMembership>> {
        let row = sqlx::query_as::<_, TenantMembership>(
            r#"
            SELECT * FROM tenant_memberships
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY tenant_id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
