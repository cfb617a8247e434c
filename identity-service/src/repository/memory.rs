//! # In-Memory Store Adapter
//!
//! HashMap-backed implementation of [`IdentityStore`] used by the test
//! suite (and useful for ephemeral tooling). It mirrors the PostgreSQL
//! adapter's observable semantics: case-insensitive email uniqueness,
//! newest-first listing, compare-and-set on reset-token consumption, and
//! cascade deletion of token rows with their owning user.
//!
//! Operations take the whole state under one lock, so every method is a
//! single atomic step, matching the per-statement atomicity contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::{AuthError, AuthResult};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    NewUser, PasswordResetToken, RefreshToken, TenantMembership, User, UserFilter,
    VerificationToken,
};
use crate::repository::IdentityStore;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    verification_tokens: HashMap<Uuid, VerificationToken>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    memberships: Vec<TenantMembership>,
}

/// In-process identity store.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    state: RwLock<State>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a membership row. Test-suite convenience; the production
    /// registry is written by the enrollment domain, not by this core.
    pub fn add_membership(&self, membership: TenantMembership) {
        self.write().memberships.push(membership);
    }

    /// Returns all verification tokens owned by a user.
    pub fn verification_tokens_for(&self, user_id: Uuid) -> Vec<VerificationToken> {
        self.read()
            .verification_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns all reset tokens owned by a user.
    pub fn reset_tokens_for(&self, user_id: Uuid) -> Vec<PasswordResetToken> {
        self.read()
            .reset_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns all refresh tokens owned by a user.
    pub fn refresh_tokens_for(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.read()
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().expect("identity store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().expect("identity store lock poisoned")
    }

    fn matches(user: &User, filter: &UserFilter) -> bool {
        if let Some(tenant_id) = filter.tenant_id {
            if user.tenant_id != Some(tenant_id) {
                return false;
            }
        }
        if let Some(role) = filter.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(is_verified) = filter.is_verified {
            if user.is_verified != is_verified {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            if !user.email.to_lowercase().contains(&needle)
                && !user.full_name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    // =========================================================================
    // USER OPERATIONS
    // =========================================================================

    async fn create_user(&self, new_user: NewUser) -> AuthResult<User> {
        let mut state = self.write();

        let collision = state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email));
        if collision {
            return Err(AuthError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: new_user.tenant_id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            role: new_user.role,
            is_verified: new_user.is_verified,
            is_locked: false,
            is_disabled: false,
            force_password_change: false,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> AuthResult<User> {
        let mut state = self.write();

        if !state.users.contains_key(&user.id) {
            return Err(AuthError::UserNotFound);
        }
        let collision = state
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if collision {
            return Err(AuthError::EmailAlreadyExists);
        }

        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> AuthResult<()> {
        let mut state = self.write();

        if state.users.remove(&id).is_none() {
            return Err(AuthError::UserNotFound);
        }
        // Same cascade the FK constraints give the SQL adapter
        state.verification_tokens.retain(|_, t| t.user_id != id);
        state.reset_tokens.retain(|_, t| t.user_id != id);
        state.refresh_tokens.retain(|_, t| t.user_id != id);

        Ok(())
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: u32,
        page_size: u32,
    ) -> AuthResult<(Vec<User>, i64)> {
        let state = self.read();

        let mut matching: Vec<User> = state
            .users
            .values()
            .filter(|u| Self::matches(u, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as i64;
        let offset = (page.saturating_sub(1) as usize) * page_size as usize;
        let users = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok((users, total))
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> AuthResult<Vec<User>> {
        let state = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn count_users(&self, filter: &UserFilter) -> AuthResult<i64> {
        Ok(self
            .read()
            .users
            .values()
            .filter(|u| Self::matches(u, filter))
            .count() as i64)
    }

    async fn email_exists(&self, email: &str) -> AuthResult<bool> {
        Ok(self
            .read()
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn email_exists_excluding(&self, email: &str, user_id: Uuid) -> AuthResult<bool> {
        Ok(self
            .read()
            .users
            .values()
            .any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email)))
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
        let row = VerificationToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.write().verification_tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_verification_token(&self, token: &str) -> AuthResult<Option<VerificationToken>> {
        Ok(self
            .read()
            .verification_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_verification_token(&self, id: Uuid) -> AuthResult<()> {
        self.write().verification_tokens.remove(&id);
        Ok(())
    }

    async fn delete_verification_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let mut state = self.write();
        let before = state.verification_tokens.len();
        state.verification_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.verification_tokens.len()) as u64)
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
        let row = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        self.write().reset_tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_reset_token(&self, token: &str) -> AuthResult<Option<PasswordResetToken>> {
        Ok(self
            .read()
            .reset_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> AuthResult<bool> {
        let mut state = self.write();
        match state.reset_tokens.get_mut(&id) {
            Some(token) if token.used_at.is_none() => {
                token.used_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_reset_token(&self, id: Uuid) -> AuthResult<()> {
        self.write().reset_tokens.remove(&id);
        Ok(())
    }

    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let mut state = self.write();
        let before = state.reset_tokens.len();
        state.reset_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.reset_tokens.len()) as u64)
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
        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };
        self.write().refresh_tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self
            .read()
            .refresh_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> AuthResult<()> {
        if let Some(token) = self.write().refresh_tokens.get_mut(&id) {
            if token.revoked_at.is_none() {
                token.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> AuthResult<u64> {
        let mut state = self.write();
        let mut revoked = 0;
        for token in state.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(Utc::now());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired_refresh_tokens(&self) -> AuthResult<u64> {
        let mut state = self.write();
        let now = Utc::now();
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - state.refresh_tokens.len()) as u64)
    }

    // =========================================================================
    // MEMBERSHIP OPERATIONS
    // =========================================================================

    async fn first_active_membership(
        &self,
        user_id: Uuid,
    ) -> AuthResult<Option<TenantMembership>> {
        Ok(self
            .read()
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.is_active)
            .cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    fn new_user(email: &str, tenant_id: Option<Uuid>) -> NewUser {
        NewUser {
            tenant_id,
            email: email.to_string(),
            password_hash: "$argon2id$test".to_string(),
            full_name: "Test User".to_string(),
            role: UserRole::Student,
            is_verified: false,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_insensitive() {
        let store = InMemoryIdentityStore::new();
        store.create_user(new_user("ada@x.io", None)).await.unwrap();

        let result = store.create_user(new_user("ADA@X.IO", None)).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn lookup_by_email_ignores_case_but_preserves_it() {
        let store = InMemoryIdentityStore::new();
        store.create_user(new_user("Ada@X.io", None)).await.unwrap();

        let found = store.find_user_by_email("ada@x.io").await.unwrap().unwrap();
        assert_eq!(found.email, "Ada@X.io");
    }

    #[tokio::test]
    async fn update_rejects_email_collision_with_other_user() {
        let store = InMemoryIdentityStore::new();
        store.create_user(new_user("first@x.io", None)).await.unwrap();
        let mut second = store.create_user(new_user("second@x.io", None)).await.unwrap();

        second.email = "FIRST@x.io".to_string();
        let result = store.update_user(&second).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn mark_reset_token_used_wins_exactly_once() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.io", None)).await.unwrap();
        let token = store
            .create_reset_token(user.id, "tok", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(store.mark_reset_token_used(token.id).await.unwrap());
        // Second consumer loses the race
        assert!(!store.mark_reset_token_used(token.id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_counts_only_active_tokens() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.io", None)).await.unwrap();
        let expiry = Utc::now() + chrono::Duration::days(7);

        let t1 = store.create_refresh_token(user.id, "t1", expiry).await.unwrap();
        store.create_refresh_token(user.id, "t2", expiry).await.unwrap();
        store.revoke_refresh_token(t1.id).await.unwrap();

        assert_eq!(store.revoke_all_refresh_tokens(user.id).await.unwrap(), 1);
        assert_eq!(store.revoke_all_refresh_tokens(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_all_token_families() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.io", None)).await.unwrap();
        let expiry = Utc::now() + chrono::Duration::hours(1);

        store.create_verification_token(user.id, "v", expiry).await.unwrap();
        store.create_reset_token(user.id, "r", expiry).await.unwrap();
        store.create_refresh_token(user.id, "s", expiry).await.unwrap();

        store.delete_user(user.id).await.unwrap();

        assert!(store.verification_tokens_for(user.id).is_empty());
        assert!(store.reset_tokens_for(user.id).is_empty());
        assert!(store.refresh_tokens_for(user.id).is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_tenant_and_reports_total() {
        let store = InMemoryIdentityStore::new();
        let tenant = Uuid::new_v4();

        for i in 0..3 {
            store
                .create_user(new_user(&format!("t{}@x.io", i), Some(tenant)))
                .await
                .unwrap();
        }
        store.create_user(new_user("other@x.io", Some(Uuid::new_v4()))).await.unwrap();

        let filter = UserFilter { tenant_id: Some(tenant), ..Default::default() };
        let (page, total) = store.list_users(&filter, 1, 2).await.unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
        assert!(page.iter().all(|u| u.tenant_id == Some(tenant)));
    }

    #[tokio::test]
    async fn list_free_text_search_covers_email_and_name() {
        let store = InMemoryIdentityStore::new();
        let mut ada = new_user("ada@x.io", None);
        ada.full_name = "Ada Lovelace".to_string();
        store.create_user(ada).await.unwrap();
        store.create_user(new_user("bob@x.io", None)).await.unwrap();

        let filter = UserFilter { search: Some("lovelace".to_string()), ..Default::default() };
        let (page, total) = store.list_users(&filter, 1, 10).await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(page[0].email, "ada@x.io");
    }

    #[tokio::test]
    async fn first_active_membership_skips_inactive_rows() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.io", None)).await.unwrap();
        let tenant = Uuid::new_v4();

        store.add_membership(TenantMembership {
            user_id: user.id,
            tenant_id: Uuid::new_v4(),
            role: UserRole::Student,
            is_active: false,
        });
        store.add_membership(TenantMembership {
            user_id: user.id,
            tenant_id: tenant,
            role: UserRole::Instructor,
            is_active: true,
        });

        let membership = store.first_active_membership(user.id).await.unwrap().unwrap();
        assert_eq!(membership.tenant_id, tenant);
        assert_eq!(membership.role, UserRole::Instructor);
    }

    #[tokio::test]
    async fn expired_refresh_tokens_are_swept() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.io", None)).await.unwrap();

        store
            .create_refresh_token(user.id, "old", Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        store
            .create_refresh_token(user.id, "new", Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_refresh_tokens().await.unwrap(), 1);
        assert_eq!(store.refresh_tokens_for(user.id).len(), 1);
    }
}
