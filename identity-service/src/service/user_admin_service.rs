//! # User-Management Service
//!
//! Administrative, tenant-scoped operations over the user population.
//!
//! ## Tenant Scoping
//!
//! Every operation takes the caller's `tenant_id` as its first functional
//! argument and gates the target user before acting:
//!
//! - a target bound to a **different** tenant is refused with
//!   `TenantMismatch`
//! - a target with a **null** tenant (pre-tenant state) is accessible to
//!   any caller
//!
//! Listings are stricter: they are filtered to the caller's tenant at the
//! store and re-filtered here as defence in depth.
//!
//! ## Relationship to the Authentication Service
//!
//! Administrative creation mirrors registration but may pre-verify the
//! account, sends no welcome mail, and mints no tokens. Administrative
//! password overrides bypass the reset-token flow entirely.

use chrono::Utc;
use shared::auth::password::{self, PasswordHasher};
use shared::errors::{AuthError, AuthResult};
use shared::validation::validate_request;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{NewUser, User, UserFilter, UserProfile, UserRole};
use crate::repository::IdentityStore;
use crate::service::dto::{
    AdminUpdateUserRequest, CreateUserRequest, ListUsersQuery, ResetUserPasswordRequest,
    UserListResponse,
};

/// Hard cap on administrative page sizes.
const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// SERVICE STRUCT
// =============================================================================

/// Administrative user-management service.
#[derive(Clone)]
pub struct UserAdminService {
    /// Persistence port
    store: Arc<dyn IdentityStore>,
    /// Password hashing port (for creation and overrides)
    hasher: Arc<PasswordHasher>,
}

impl UserAdminService {
    /// Creates a new user-management service instance.
    pub fn new(store: Arc<dyn IdentityStore>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    // =========================================================================
    // CREATE / READ
    // =========================================================================

    /// Creates a user inside the caller's tenant.
    ///
    /// Unlike self-registration the creator chooses the initial
    /// verification state, no welcome mail is sent, and no tokens are
    /// minted.
    pub async fn create_user(
        &self,
        tenant_id: Uuid,
        req: CreateUserRequest,
    ) -> AuthResult<UserProfile> {
        validate_request(&req)?;
        password::validate_strength(&req.password)?;

        if self.store.email_exists(&req.email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let user = self
            .store
            .create_user(NewUser {
                tenant_id: Some(tenant_id),
                email: req.email,
                password_hash,
                full_name: req.full_name,
                role: req.role,
                is_verified: req.is_verified,
            })
            .await?;

        info!(user_id = %user.id, tenant_id = %tenant_id, "User created by admin");

        Ok(user.into())
    }

    /// Fetches one user, tenant-gated.
    pub async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<UserProfile> {
        let user = self.load_gated(tenant_id, user_id).await?;
        Ok(user.into())
    }

    /// Lists users of the caller's tenant with filtering and pagination.
    pub async fn list_users(
        &self,
        tenant_id: Uuid,
        query: ListUsersQuery,
    ) -> AuthResult<UserListResponse> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);

        let filter = UserFilter {
            tenant_id: Some(tenant_id),
            role: query.role,
            is_verified: query.is_verified,
            search: query.search,
        };

        let (users, total) = self.store.list_users(&filter, page, page_size).await?;

        // Defence in depth on top of the store's tenant filter
        let users: Vec<UserProfile> = users
            .into_iter()
            .filter(|u| u.tenant_id == Some(tenant_id))
            .map(UserProfile::from)
            .collect();

        Ok(Self::page_response(users, total, page, page_size))
    }

    /// Lists every user of the caller's tenant.
    pub async fn get_users_by_tenant(
        &self,
        tenant_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> AuthResult<UserListResponse> {
        self.list_users(
            tenant_id,
            ListUsersQuery { page, page_size, ..Default::default() },
        )
        .await
    }

    /// Lists users of the caller's tenant holding one role.
    pub async fn get_users_by_role(
        &self,
        tenant_id: Uuid,
        role: UserRole,
        page: u32,
        page_size: u32,
    ) -> AuthResult<UserListResponse> {
        self.list_users(
            tenant_id,
            ListUsersQuery { role: Some(role), page, page_size, ..Default::default() },
        )
        .await
    }

    /// Counts the users of the caller's tenant.
    pub async fn count_users(&self, tenant_id: Uuid) -> AuthResult<i64> {
        let filter = UserFilter { tenant_id: Some(tenant_id), ..Default::default() };
        self.store.count_users(&filter).await
    }

    /// Batch-fetches users by id.
    ///
    /// Users bound to a different tenant are silently dropped from the
    /// result; pre-tenant users are included.
    pub async fn get_users_by_ids(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> AuthResult<Vec<UserProfile>> {
        let users = self.store.find_users_by_ids(ids).await?;

        Ok(users
            .into_iter()
            .filter(|u| u.tenant_id.is_none() || u.tenant_id == Some(tenant_id))
            .map(UserProfile::from)
            .collect())
    }

    // =========================================================================
    // UPDATE / DELETE
    // =========================================================================

    /// Updates a user's profile fields, role, or verification state.
    pub async fn update_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        req: AdminUpdateUserRequest,
    ) -> AuthResult<UserProfile> {
        validate_request(&req)?;

        let mut user = self.load_gated(tenant_id, user_id).await?;

        if let Some(full_name) = req.full_name {
            if !full_name.trim().is_empty() {
                user.full_name = full_name;
            }
        }
        if let Some(email) = req.email {
            if email != user.email {
                if self.store.email_exists_excluding(&email, user.id).await? {
                    return Err(AuthError::EmailAlreadyExists);
                }
                user.email = email;
            }
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(is_verified) = req.is_verified {
            user.is_verified = is_verified;
        }

        user.updated_at = Utc::now();
        let user = self.store.update_user(&user).await?;

        info!(user_id = %user.id, tenant_id = %tenant_id, "User updated by admin");

        Ok(user.into())
    }

    /// Deletes a user and everything they own.
    ///
    /// Token purges run before the user row is removed; a failed purge is
    /// logged and does not abort the deletion (the storage-level cascade
    /// catches any remnant).
    pub async fn delete_user(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<()> {
        let user = self.load_gated(tenant_id, user_id).await?;

        if let Err(e) = self.store.delete_verification_tokens_for_user(user.id).await {
            warn!(user_id = %user.id, error = %e, "Verification token purge failed");
        }
        if let Err(e) = self.store.delete_reset_tokens_for_user(user.id).await {
            warn!(user_id = %user.id, error = %e, "Reset token purge failed");
        }
        if let Err(e) = self.store.revoke_all_refresh_tokens(user.id).await {
            warn!(user_id = %user.id, error = %e, "Session revocation failed");
        }

        self.store.delete_user(user.id).await?;

        info!(user_id = %user.id, tenant_id = %tenant_id, "User deleted by admin");

        Ok(())
    }

    // =========================================================================
    // VERIFICATION OVERRIDES
    // =========================================================================

    /// Marks a user's email as verified and purges outstanding
    /// verification tokens.
    pub async fn verify_user(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<UserProfile> {
        let mut user = self.load_gated(tenant_id, user_id).await?;

        if !user.is_verified {
            user.is_verified = true;
            user.updated_at = Utc::now();
            user = self.store.update_user(&user).await?;
        }

        if let Err(e) = self.store.delete_verification_tokens_for_user(user.id).await {
            warn!(user_id = %user.id, error = %e, "Verification token purge failed");
        }

        info!(user_id = %user.id, "User verified by admin");

        Ok(user.into())
    }

    /// Clears a user's verification latch.
    ///
    /// This is the only path that un-verifies an account. Outstanding
    /// verification tokens are deliberately kept: an emailed link that is
    /// still in flight stays usable.
    pub async fn unverify_user(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<UserProfile> {
        let mut user = self.load_gated(tenant_id, user_id).await?;

        if user.is_verified {
            user.is_verified = false;
            user.updated_at = Utc::now();
            user = self.store.update_user(&user).await?;
        }

        info!(user_id = %user.id, "User unverified by admin");

        Ok(user.into())
    }

    // =========================================================================
    // PASSWORD OVERRIDES
    // =========================================================================

    /// Sets a user's password directly, bypassing the reset-token flow.
    ///
    /// All sessions are revoked and outstanding reset tokens purged;
    /// failures of those follow-ups are logged and swallowed.
    pub async fn reset_user_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        req: ResetUserPasswordRequest,
    ) -> AuthResult<()> {
        password::validate_strength(&req.new_password)?;

        let mut user = self.load_gated(tenant_id, user_id).await?;

        user.password_hash = self.hasher.hash(&req.new_password)?;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        if let Err(e) = self.store.revoke_all_refresh_tokens(user.id).await {
            warn!(user_id = %user.id, error = %e, "Session revocation failed");
        }
        if let Err(e) = self.store.delete_reset_tokens_for_user(user.id).await {
            warn!(user_id = %user.id, error = %e, "Reset token purge failed");
        }

        info!(user_id = %user.id, "Password reset by admin");

        Ok(())
    }

    /// Forces the user to re-authenticate and change their password.
    ///
    /// Sets the `force_password_change` flag and revokes every session so
    /// the next interaction must go through login again.
    pub async fn force_password_change(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<()> {
        let mut user = self.load_gated(tenant_id, user_id).await?;

        user.force_password_change = true;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        self.store.revoke_all_refresh_tokens(user.id).await?;

        info!(user_id = %user.id, "Password change forced by admin");

        Ok(())
    }

    // =========================================================================
    // HELPER METHODS
    // =========================================================================

    /// Loads the target user and enforces the tenant-scoping rule.
    async fn load_gated(&self, tenant_id: Uuid, user_id: Uuid) -> AuthResult<User> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(bound) = user.tenant_id {
            if bound != tenant_id {
                warn!(
                    user_id = %user.id,
                    asserted = %tenant_id,
                    "Administrative access across tenants refused"
                );
                return Err(AuthError::TenantMismatch);
            }
        }

        Ok(user)
    }

    fn page_response(
        users: Vec<UserProfile>,
        total: i64,
        page: u32,
        page_size: u32,
    ) -> UserListResponse {
        let total_pages = ((total as f64) / (page_size as f64)).ceil() as u32;
        UserListResponse { users, total, page, page_size, total_pages }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryIdentityStore;
    use chrono::Duration;

    struct Harness {
        store: Arc<InMemoryIdentityStore>,
        service: UserAdminService,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = UserAdminService::new(store.clone(), Arc::new(PasswordHasher::new()));
        Harness { store, service }
    }

    fn create_request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            password: "pw-ABC-123!".into(),
            full_name: "Test User".into(),
            role: UserRole::Student,
            is_verified: true,
        }
    }

    #[tokio::test]
    async fn create_user_can_preverify_and_mints_nothing() {
        let h = harness();
        let tenant = Uuid::new_v4();

        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();

        assert!(profile.is_verified);
        assert_eq!(profile.tenant_id, Some(tenant));

        // No welcome mail path exists here, and no tokens were created
        assert!(h.store.verification_tokens_for(profile.id).is_empty());
        assert!(h.store.refresh_tokens_for(profile.id).is_empty());
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let h = harness();
        let tenant = Uuid::new_v4();
        h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();

        let result = h.service.create_user(tenant, create_request("A@x.io")).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn updates_across_tenants_are_refused_and_change_nothing() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("d@x.io")).await.unwrap();

        let result = h
            .service
            .update_user(
                Uuid::new_v4(),
                profile.id,
                AdminUpdateUserRequest { full_name: Some("Mallory".into()), ..Default::default() },
            )
            .await;
        assert!(matches!(result, Err(AuthError::TenantMismatch)));

        // The stored name is untouched, observable through the right tenant
        let unchanged = h.service.get_user(tenant, profile.id).await.unwrap();
        assert_eq!(unchanged.full_name, "Test User");
    }

    #[tokio::test]
    async fn pre_tenant_users_are_accessible_to_any_caller() {
        let h = harness();
        let user = h
            .store
            .create_user(NewUser {
                tenant_id: None,
                email: "floating@x.io".into(),
                password_hash: "$argon2id$x".into(),
                full_name: "Floating".into(),
                role: UserRole::Student,
                is_verified: false,
            })
            .await
            .unwrap();

        let profile = h.service.get_user(Uuid::new_v4(), user.id).await.unwrap();
        assert_eq!(profile.email, "floating@x.io");
    }

    #[tokio::test]
    async fn delete_user_cascades_all_token_families() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();
        let expiry = Utc::now() + Duration::hours(1);

        h.store.create_verification_token(profile.id, "v", expiry).await.unwrap();
        h.store.create_reset_token(profile.id, "r", expiry).await.unwrap();
        h.store.create_refresh_token(profile.id, "s", expiry).await.unwrap();

        h.service.delete_user(tenant, profile.id).await.unwrap();

        assert!(h.store.find_user_by_id(profile.id).await.unwrap().is_none());
        assert!(h.store.verification_tokens_for(profile.id).is_empty());
        assert!(h.store.reset_tokens_for(profile.id).is_empty());
        assert!(h.store.refresh_tokens_for(profile.id).is_empty());
    }

    #[tokio::test]
    async fn list_users_is_scoped_to_the_tenant() {
        let h = harness();
        let tenant = Uuid::new_v4();
        for i in 0..3 {
            h.service
                .create_user(tenant, create_request(&format!("u{}@x.io", i)))
                .await
                .unwrap();
        }
        h.service
            .create_user(Uuid::new_v4(), create_request("other@x.io"))
            .await
            .unwrap();

        let listing = h
            .service
            .list_users(tenant, ListUsersQuery { page_size: 2, ..Default::default() })
            .await
            .unwrap();

        assert_eq!(listing.total, 3);
        assert_eq!(listing.users.len(), 2);
        assert_eq!(listing.total_pages, 2);
        assert!(listing.users.iter().all(|u| u.tenant_id == Some(tenant)));
    }

    #[tokio::test]
    async fn listing_by_role_filters_correctly() {
        let h = harness();
        let tenant = Uuid::new_v4();
        h.service.create_user(tenant, create_request("s@x.io")).await.unwrap();
        let mut instructor = create_request("i@x.io");
        instructor.role = UserRole::Instructor;
        h.service.create_user(tenant, instructor).await.unwrap();

        let listing = h
            .service
            .get_users_by_role(tenant, UserRole::Instructor, 1, 20)
            .await
            .unwrap();

        assert_eq!(listing.total, 1);
        assert_eq!(listing.users[0].email, "i@x.io");
    }

    #[tokio::test]
    async fn batch_fetch_drops_foreign_tenants_but_keeps_pre_tenant_users() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let ours = h.service.create_user(tenant, create_request("ours@x.io")).await.unwrap();
        let theirs = h
            .service
            .create_user(Uuid::new_v4(), create_request("theirs@x.io"))
            .await
            .unwrap();
        let floating = h
            .store
            .create_user(NewUser {
                tenant_id: None,
                email: "floating@x.io".into(),
                password_hash: "$argon2id$x".into(),
                full_name: "Floating".into(),
                role: UserRole::Student,
                is_verified: false,
            })
            .await
            .unwrap();

        let users = h
            .service
            .get_users_by_ids(tenant, &[ours.id, theirs.id, floating.id])
            .await
            .unwrap();

        let emails: Vec<_> = users.iter().map(|u| u.email.as_str()).collect();
        assert!(emails.contains(&"ours@x.io"));
        assert!(emails.contains(&"floating@x.io"));
        assert!(!emails.contains(&"theirs@x.io"));
    }

    #[tokio::test]
    async fn count_users_counts_only_the_tenant() {
        let h = harness();
        let tenant = Uuid::new_v4();
        h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();
        h.service.create_user(Uuid::new_v4(), create_request("b@x.io")).await.unwrap();

        assert_eq!(h.service.count_users(tenant).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn verify_user_flips_the_latch_and_purges_tokens() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let mut req = create_request("a@x.io");
        req.is_verified = false;
        let profile = h.service.create_user(tenant, req).await.unwrap();
        h.store
            .create_verification_token(profile.id, "pending", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let verified = h.service.verify_user(tenant, profile.id).await.unwrap();

        assert!(verified.is_verified);
        assert!(h.store.verification_tokens_for(profile.id).is_empty());
    }

    #[tokio::test]
    async fn unverify_user_keeps_outstanding_tokens() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();
        h.store
            .create_verification_token(profile.id, "pending", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let unverified = h.service.unverify_user(tenant, profile.id).await.unwrap();

        assert!(!unverified.is_verified);
        // Unlike the verify override, the token rows survive
        assert_eq!(h.store.verification_tokens_for(profile.id).len(), 1);
    }

    #[tokio::test]
    async fn admin_password_reset_revokes_sessions_and_purges_reset_tokens() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();
        let expiry = Utc::now() + Duration::hours(1);
        h.store.create_refresh_token(profile.id, "session", expiry).await.unwrap();
        h.store.create_reset_token(profile.id, "pending-reset", expiry).await.unwrap();

        h.service
            .reset_user_password(
                tenant,
                profile.id,
                ResetUserPasswordRequest { new_password: "pw-NEW-456!".into() },
            )
            .await
            .unwrap();

        let sessions = h.store.refresh_tokens_for(profile.id);
        assert!(sessions.iter().all(|t| t.revoked_at.is_some()));
        assert!(h.store.reset_tokens_for(profile.id).is_empty());

        // The new hash actually matches the new password
        let user = h.store.find_user_by_id(profile.id).await.unwrap().unwrap();
        assert!(PasswordHasher::new().verify("pw-NEW-456!", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn admin_password_reset_rejects_weak_passwords() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();

        let result = h
            .service
            .reset_user_password(
                tenant,
                profile.id,
                ResetUserPasswordRequest { new_password: "short".into() },
            )
            .await;
        assert!(matches!(result, Err(AuthError::PasswordTooWeak)));
    }

    #[tokio::test]
    async fn force_password_change_sets_the_flag_and_kills_sessions() {
        let h = harness();
        let tenant = Uuid::new_v4();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();
        h.store
            .create_refresh_token(profile.id, "session", Utc::now() + Duration::days(7))
            .await
            .unwrap();

        h.service.force_password_change(tenant, profile.id).await.unwrap();

        let user = h.store.find_user_by_id(profile.id).await.unwrap().unwrap();
        assert!(user.force_password_change);
        assert!(h
            .store
            .refresh_tokens_for(profile.id)
            .iter()
            .all(|t| t.revoked_at.is_some()));
    }

    #[tokio::test]
    async fn admin_update_changes_role_and_rejects_email_collisions() {
        let h = harness();
        let tenant = Uuid::new_v4();
        h.service.create_user(tenant, create_request("taken@x.io")).await.unwrap();
        let profile = h.service.create_user(tenant, create_request("a@x.io")).await.unwrap();

        let updated = h
            .service
            .update_user(
                tenant,
                profile.id,
                AdminUpdateUserRequest {
                    role: Some(UserRole::Admin),
                    is_verified: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Admin);
        assert!(!updated.is_verified);

        let collision = h
            .service
            .update_user(
                tenant,
                profile.id,
                AdminUpdateUserRequest { email: Some("taken@x.io".into()), ..Default::default() },
            )
            .await;
        assert!(matches!(collision, Err(AuthError::EmailAlreadyExists)));
    }
}
