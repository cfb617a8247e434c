//! # Authentication Service
//!
//! Core business logic for all credential-bearing user operations:
//! registration, login, session refresh, logout, email verification,
//! password lifecycle, role switching, and self profile access.
//!
//! ## Token Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐                      ┌─────────────────────────┐   │
//! │  │  Access Token   │                      │    Refresh Token        │   │
//! │  │  (JWT, short)   │                      │    (opaque, long)       │   │
//! │  └────────┬────────┘                      └───────────┬─────────────┘   │
//! │           │ stateless, not tracked                    │ stored in the   │
//! │           │ by the store                              │ identity store  │
//! │           ▼                                           ▼                 │
//! │  ┌─────────────────┐                      ┌─────────────────────────┐   │
//! │  │ verified by     │                      │ revocable via database  │   │
//! │  │ signature only  │                      │ lookup; not rotated     │   │
//! │  └─────────────────┘                      └─────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Contracts
//!
//! Within each operation the store writes happen in a fixed order (see the
//! method docs); the service never reorders them. The email-existence
//! pre-check in registration is an optimisation only: the store's uniqueness
//! constraint is the actual guarantee, and its violation maps back to
//! `EmailAlreadyExists`.
//!
//! ## Enumeration Protection
//!
//! `resend_verification` and `forgot_password` return success whether or not
//! the account exists; `login` reports the same `InvalidCredentials` for
//! unknown email and wrong password.

use chrono::{Duration as ChronoDuration, Utc};
use shared::auth::jwt::{AccessTokenClaims, AccessTokenIssuer};
use shared::auth::opaque::new_opaque_token;
use shared::auth::password::{self, PasswordHasher};
use shared::config::TokenExpiryConfig;
use shared::errors::{AuthError, AuthResult};
use shared::validation::validate_request;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{NewUser, User, UserProfile};
use crate::email::SharedMailer;
use crate::repository::IdentityStore;
use crate::service::dto::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    RefreshTokenRequest, RegisterRequest, ResendVerificationRequest, ResetPasswordRequest,
    SwitchRoleRequest, SwitchRoleResponse, UpdateProfileRequest, VerifyEmailRequest,
    TOKEN_TYPE_BEARER,
};

// =============================================================================
// SERVICE STRUCT
// =============================================================================

/// Authentication service.
///
/// # Thread Safety
///
/// `AuthService` is `Send + Sync`; all collaborators are injected behind
/// `Arc` and internally synchronised. There is no other shared mutable
/// state: each request is a linear sequence of store and port calls.
#[derive(Clone)]
pub struct AuthService {
    /// Persistence port
    store: Arc<dyn IdentityStore>,
    /// Password hashing port
    hasher: Arc<PasswordHasher>,
    /// Access-token codec
    issuer: Arc<AccessTokenIssuer>,
    /// Outbound mail port
    mailer: SharedMailer,
    /// Lifetimes for the four token families
    expiry: TokenExpiryConfig,
}

impl AuthService {
    /// Creates a new authentication service instance.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<PasswordHasher>,
        issuer: Arc<AccessTokenIssuer>,
        mailer: SharedMailer,
        expiry: TokenExpiryConfig,
    ) -> Self {
        Self { store, hasher, issuer, mailer, expiry }
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Registers a new user account.
    ///
    /// # Process
    ///
    /// 1. Validate request shape and password strength
    /// 2. Check email non-existence (pre-check; the store constraint is the
    ///    real guarantee)
    /// 3. Hash password with Argon2id
    /// 4. Persist the user, unverified, bound to `tenant_id` when given
    /// 5. Generate and persist a verification token
    /// 6. Attempt the welcome mail (failure logged, never fatal)
    /// 7. Mint the access token, create and persist a refresh token
    pub async fn register(
        &self,
        tenant_id: Option<Uuid>,
        req: RegisterRequest,
    ) -> AuthResult<AuthResponse> {
        validate_request(&req)?;
        password::validate_strength(&req.password)?;

        if self.store.email_exists(&req.email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let user = self
            .store
            .create_user(NewUser {
                tenant_id,
                email: req.email,
                password_hash,
                full_name: req.full_name,
                role: req.role,
                is_verified: false,
            })
            .await?;

        info!(user_id = %user.id, "User registered");

        let verification_token = new_opaque_token();
        let expires_at =
            Utc::now() + ChronoDuration::seconds(self.expiry.verify_token_expiry_seconds as i64);
        self.store
            .create_verification_token(user.id, &verification_token, expires_at)
            .await?;

        // The verification record is durable; a lost welcome mail is
        // recoverable through the resend flow
        if let Err(e) = self
            .mailer
            .send_welcome(&user.email, &user.full_name, &verification_token)
            .await
        {
            warn!(user_id = %user.id, error = %e, "Welcome email failed");
        }

        let access_token = self.mint_access_token(&user, user.tenant_id)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;

        Ok(AuthResponse::new(
            access_token,
            refresh_token,
            self.expiry.access_token_expiry_seconds as i64,
            user.into(),
        ))
    }

    // =========================================================================
    // LOGIN
    // =========================================================================

    /// Authenticates a user with email and password.
    ///
    /// Unknown email and wrong password both surface as
    /// `InvalidCredentials`. A caller-asserted tenant that disagrees with
    /// the user's binding fails with `TenantMismatch`; when the caller
    /// asserts no tenant the check is skipped. Unverified accounts cannot
    /// log in.
    pub async fn login(
        &self,
        tenant_id: Option<Uuid>,
        req: LoginRequest,
    ) -> AuthResult<AuthResponse> {
        validate_request(&req)?;

        let user = self
            .store
            .find_user_by_email(&req.email)
            .await?
            .ok_or_else(|| {
                // Same error as a wrong password, to prevent enumeration
                warn!(email = %req.email, "Login attempt for unknown email");
                AuthError::InvalidCredentials
            })?;

        if let (Some(asserted), Some(bound)) = (tenant_id, user.tenant_id) {
            if asserted != bound {
                warn!(user_id = %user.id, "Login tenant mismatch");
                return Err(AuthError::TenantMismatch);
            }
        }

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_locked {
            return Err(AuthError::AccountLocked);
        }
        if user.is_disabled {
            return Err(AuthError::AccountDisabled);
        }
        if !user.is_verified {
            return Err(AuthError::AccountNotVerified);
        }

        // Resolve a tenant for the claims through the membership registry
        // when the user row itself carries none
        let claim_tenant = match user.tenant_id {
            Some(t) => Some(t),
            None => self
                .store
                .first_active_membership(user.id)
                .await?
                .map(|m| m.tenant_id),
        };

        let access_token = self.mint_access_token(&user, claim_tenant)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;

        info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse::new(
            access_token,
            refresh_token,
            self.expiry.access_token_expiry_seconds as i64,
            user.into(),
        ))
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Revokes one refresh token, ending that session.
    ///
    /// The token must exist (`TokenNotFound`) and belong to the caller
    /// (`Unauthorized`). Revocation is idempotent in effect.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> AuthResult<()> {
        let token = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if token.user_id != user_id {
            warn!(user_id = %user_id, token_owner = %token.user_id, "Logout with foreign token");
            return Err(AuthError::Unauthorized);
        }

        self.store.revoke_refresh_token(token.id).await?;

        info!(user_id = %user_id, "Session revoked");

        Ok(())
    }

    /// Exchanges a valid refresh token for a new access token.
    ///
    /// The refresh token itself is **returned unchanged**; this core does
    /// not rotate refresh tokens. Unknown, expired, and revoked tokens all
    /// collapse to `RefreshTokenInvalid`.
    pub async fn refresh_access_token(&self, req: RefreshTokenRequest) -> AuthResult<AuthResponse> {
        validate_request(&req)?;

        let token = self
            .store
            .find_refresh_token(&req.refresh_token)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        if !token.is_valid() {
            return Err(AuthError::RefreshTokenInvalid);
        }

        let user = self
            .store
            .find_user_by_id(token.user_id)
            .await?
            .ok_or(AuthError::RefreshTokenInvalid)?;

        let claim_tenant = match user.tenant_id {
            Some(t) => Some(t),
            None => self
                .store
                .first_active_membership(user.id)
                .await?
                .map(|m| m.tenant_id),
        };
        let access_token = self.mint_access_token(&user, claim_tenant)?;

        Ok(AuthResponse::new(
            access_token,
            req.refresh_token,
            self.expiry.access_token_expiry_seconds as i64,
            user.into(),
        ))
    }

    /// Unconditionally revokes every active session of a user.
    ///
    /// Returns the number of sessions revoked.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AuthResult<u64> {
        let revoked = self.store.revoke_all_refresh_tokens(user_id).await?;

        info!(user_id = %user_id, sessions_revoked = revoked, "All sessions revoked");

        Ok(revoked)
    }

    // =========================================================================
    // EMAIL VERIFICATION
    // =========================================================================

    /// Completes email verification with a token from the emailed link.
    ///
    /// The consumed token is deleted afterwards; that cleanup is best-effort
    /// and a duplicate call observes `AlreadyVerified` from the user record,
    /// which is the correct caller-facing answer.
    pub async fn verify_email(&self, req: VerifyEmailRequest) -> AuthResult<UserProfile> {
        validate_request(&req)?;

        let token = self
            .store
            .find_verification_token(&req.token)
            .await?
            .ok_or(AuthError::VerificationTokenInvalid)?;

        if token.is_expired() {
            return Err(AuthError::VerificationTokenExpired);
        }

        let mut user = self
            .store
            .find_user_by_id(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            // The latch only flips once, even for an unexpired token
            return Err(AuthError::AlreadyVerified);
        }

        user.is_verified = true;
        user.updated_at = Utc::now();
        let user = self.store.update_user(&user).await?;

        if let Err(e) = self.store.delete_verification_token(token.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to delete consumed verification token");
        }

        info!(user_id = %user.id, "Email verified");

        Ok(user.into())
    }

    /// Re-sends the verification email.
    ///
    /// Succeeds silently for unknown emails (enumeration protection).
    /// Unlike registration, a mail failure here is fatal: the caller asked
    /// for exactly this mail.
    pub async fn resend_verification(&self, req: ResendVerificationRequest) -> AuthResult<()> {
        validate_request(&req)?;

        let user = match self.store.find_user_by_email(&req.email).await? {
            Some(user) => user,
            None => {
                info!(email = %req.email, "Verification resend for unknown email");
                return Ok(());
            }
        };

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.store.delete_verification_tokens_for_user(user.id).await?;

        let token = new_opaque_token();
        let expires_at =
            Utc::now() + ChronoDuration::seconds(self.expiry.verify_token_expiry_seconds as i64);
        self.store
            .create_verification_token(user.id, &token, expires_at)
            .await?;

        self.mailer
            .send_welcome(&user.email, &user.full_name, &token)
            .await
            .map_err(|e| {
                warn!(user_id = %user.id, error = %e, "Verification resend failed");
                AuthError::VerificationEmailFailed
            })?;

        info!(user_id = %user.id, "Verification email resent");

        Ok(())
    }

    // =========================================================================
    // PASSWORD RESET
    // =========================================================================

    /// Initiates the password-reset flow.
    ///
    /// Succeeds silently for unknown emails and for tenant mismatches, and
    /// swallows mail failures: this endpoint must not be usable to probe
    /// account existence.
    pub async fn forgot_password(
        &self,
        tenant_id: Option<Uuid>,
        req: ForgotPasswordRequest,
    ) -> AuthResult<()> {
        validate_request(&req)?;

        let user = match self.store.find_user_by_email(&req.email).await? {
            Some(user) => user,
            None => {
                info!(email = %req.email, "Password reset for unknown email");
                return Ok(());
            }
        };

        if let (Some(asserted), Some(bound)) = (tenant_id, user.tenant_id) {
            if asserted != bound {
                info!(user_id = %user.id, "Password reset with mismatched tenant");
                return Ok(());
            }
        }

        self.store.delete_reset_tokens_for_user(user.id).await?;

        let token = new_opaque_token();
        let expires_at =
            Utc::now() + ChronoDuration::seconds(self.expiry.reset_token_expiry_seconds as i64);
        self.store.create_reset_token(user.id, &token, expires_at).await?;

        if let Err(e) = self
            .mailer
            .send_password_reset(&user.email, &user.full_name, &token)
            .await
        {
            warn!(user_id = %user.id, error = %e, "Reset email failed");
        }

        info!(user_id = %user.id, "Password reset initiated");

        Ok(())
    }

    /// Completes a password reset with a token from the emailed link.
    ///
    /// Consumed and expired tokens are reported as distinct kinds. On
    /// success every refresh token of the user is revoked. Failures to
    /// revoke sessions after the password write are logged and swallowed.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> AuthResult<()> {
        validate_request(&req)?;

        let token = self
            .store
            .find_reset_token(&req.token)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        // Consumed wins over expired so a replay is always reported as used
        if token.is_used() {
            return Err(AuthError::ResetTokenUsed);
        }
        if token.is_expired() {
            return Err(AuthError::ResetTokenExpired);
        }

        password::validate_strength(&req.new_password)?;

        let mut user = self
            .store
            .find_user_by_id(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        user.password_hash = self.hasher.hash(&req.new_password)?;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        // Conditional consumption; losing the race means another consumer
        // reset the password between our fetch and this statement
        if !self.store.mark_reset_token_used(token.id).await? {
            warn!(user_id = %user.id, "Reset token consumed concurrently");
            return Err(AuthError::ResetTokenUsed);
        }

        if let Err(e) = self.store.revoke_all_refresh_tokens(user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to revoke sessions after reset");
        }

        info!(user_id = %user.id, "Password reset completed");

        Ok(())
    }

    /// Changes the caller's password after verifying the current one.
    ///
    /// The new password must differ from the stored one. All refresh tokens
    /// are revoked, including the caller's own session.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
    ) -> AuthResult<()> {
        validate_request(&req)?;
        password::validate_strength(&req.new_password)?;

        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.hasher.verify(&req.current_password, &user.password_hash)? {
            return Err(AuthError::CurrentPasswordIncorrect);
        }

        if self.hasher.verify(&req.new_password, &user.password_hash)? {
            return Err(AuthError::PasswordSameAsOld);
        }

        user.password_hash = self.hasher.hash(&req.new_password)?;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        self.store.revoke_all_refresh_tokens(user_id).await?;

        info!(user_id = %user_id, "Password changed, all sessions revoked");

        Ok(())
    }

    // =========================================================================
    // PROFILE
    // =========================================================================

    /// Returns the caller's sanitised profile.
    pub async fn get_current_user(&self, user_id: Uuid) -> AuthResult<UserProfile> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }

    /// Updates the caller's own profile.
    ///
    /// A changed email must be unique (excluding the caller), clears the
    /// verification latch, and triggers a fresh verification mail following
    /// the registration ordering. A `None` or empty `full_name` is left
    /// unchanged.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> AuthResult<UserProfile> {
        validate_request(&req)?;

        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(full_name) = req.full_name {
            if !full_name.trim().is_empty() {
                user.full_name = full_name;
            }
        }

        let mut email_changed = false;
        if let Some(email) = req.email {
            if email != user.email {
                if self.store.email_exists_excluding(&email, user.id).await? {
                    return Err(AuthError::EmailAlreadyExists);
                }
                user.email = email;
                // An unproven address drops the verification latch
                user.is_verified = false;
                email_changed = true;
            }
        }

        user.updated_at = Utc::now();
        let user = self.store.update_user(&user).await?;

        if email_changed {
            self.store.delete_verification_tokens_for_user(user.id).await?;

            let token = new_opaque_token();
            let expires_at = Utc::now()
                + ChronoDuration::seconds(self.expiry.verify_token_expiry_seconds as i64);
            self.store
                .create_verification_token(user.id, &token, expires_at)
                .await?;

            if let Err(e) = self
                .mailer
                .send_welcome(&user.email, &user.full_name, &token)
                .await
            {
                warn!(user_id = %user.id, error = %e, "Re-verification email failed");
            }

            info!(user_id = %user.id, "Email changed, re-verification required");
        }

        Ok(user.into())
    }

    // =========================================================================
    // ROLE SWITCHING
    // =========================================================================

    /// Activates a role the user holds and mints an access token carrying it.
    ///
    /// The requested role must be the user's own role or granted by an
    /// active membership in the given tenant; anything else fails with
    /// `RoleNotAssigned`.
    pub async fn switch_role(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        req: SwitchRoleRequest,
    ) -> AuthResult<SwitchRoleResponse> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let assigned = user.role == req.role
            || self
                .store
                .first_active_membership(user.id)
                .await?
                .map(|m| m.tenant_id == tenant_id && m.role == req.role)
                .unwrap_or(false);

        if !assigned {
            warn!(user_id = %user.id, requested = %req.role, "Role switch rejected");
            return Err(AuthError::RoleNotAssigned);
        }

        user.role = req.role;
        user.updated_at = Utc::now();
        let user = self.store.update_user(&user).await?;

        let access_token = self.mint_access_token(&user, Some(tenant_id))?;

        info!(user_id = %user.id, role = %user.role, "Active role switched");

        Ok(SwitchRoleResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.expiry.access_token_expiry_seconds as i64,
            user: user.into(),
        })
    }

    // =========================================================================
    // HELPER METHODS
    // =========================================================================

    /// Mints an access token for the user, bound to the given tenant.
    fn mint_access_token(&self, user: &User, tenant_id: Option<Uuid>) -> AuthResult<String> {
        self.issuer.mint(
            AccessTokenClaims {
                user_id: user.id,
                tenant_id,
                email: user.email.clone(),
                role: user.role.to_string(),
            },
            self.expiry.access_token_expiry_seconds,
        )
    }

    /// Generates and persists a refresh token, returning its opaque string.
    async fn issue_refresh_token(&self, user_id: Uuid) -> AuthResult<String> {
        let token = new_opaque_token();
        let expires_at =
            Utc::now() + ChronoDuration::seconds(self.expiry.refresh_token_expiry_seconds as i64);

        self.store.create_refresh_token(user_id, &token, expires_at).await?;

        Ok(token)
    }
}

// =============================================================================
// TESTS
// =============================================================================
