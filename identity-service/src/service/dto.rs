//! # Service Request/Response Types
//!
//! The data shapes the services accept and return. These are the wire
//! contract a transport serializes; the services never see transport
//! envelopes.
//!
//! ## Validation Rules
//!
//! | Field | Rules |
//! |-------------|----------------------------------------------------|
//! | `email` | Valid email format, max 255 chars |
//! | `full_name` | Non-blank, max 200 chars |
//! | `token` | Non-blank |
//! | `password` | Strength checked in the service layer so weak and |
//! | | over-long inputs surface as their own error kinds |
//!
//! ## JSON Naming Convention
//!
//! All types use `camelCase` for JSON serialization to match JavaScript
//! conventions on the frontend.

use serde::{Deserialize, Serialize};
use shared::validation::validators;
use validator::Validate;

use crate::domain::{UserProfile, UserRole};

/// Token type literal carried in every auth response.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

// =============================================================================
// AUTHENTICATION REQUESTS
// =============================================================================

/// Request body for self-registration.
///
/// # Example JSON
///
/// ```json
/// {
///   "email": "user@example.com",
///   "password": "SecurePass123!",
///   "fullName": "Ada Lovelace",
///   "role": "student"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// User's email address
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,

    /// Plain text password
    pub password: String,

    /// User's display name
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    #[validate(custom(function = "validators::not_blank"))]
    pub full_name: String,

    /// Requested role. Deserialization rejects anything outside the closed
    /// role set.
    #[serde(default)]
    pub role: UserRole,
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// User's email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Plain text password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request body for exchanging a refresh token for a new access token.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// The refresh token string issued at login or registration
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

// =============================================================================
// EMAIL VERIFICATION REQUESTS
// =============================================================================

/// Request body for completing email verification.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    /// The opaque verification token from the emailed link
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Request body for re-sending the verification email.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    /// Email address to resend to
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

// =============================================================================
// PASSWORD REQUESTS
// =============================================================================

/// Request body for initiating a password reset.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    /// Email address of the account
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Request body for completing a password reset.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// The opaque reset token from the emailed link
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    /// The new plain text password
    pub new_password: String,
}

/// Request body for an authenticated password change.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// The caller's current password
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    /// The new plain text password
    pub new_password: String,
}

// =============================================================================
// PROFILE REQUESTS
// =============================================================================

/// Request body for a self-service profile update.
///
/// Both fields are optional; absent fields are left unchanged. A changed
/// email clears the verification latch and triggers re-verification.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    /// New display name (ignored when empty)
    pub full_name: Option<String>,

    /// New email address
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Request body for switching the active role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRoleRequest {
    /// The role to activate. Must be assigned to the user.
    pub role: UserRole,
}

// =============================================================================
// ADMINISTRATIVE REQUESTS
// =============================================================================

/// Request body for administrative user creation.
///
/// Unlike self-registration this may pre-verify the account, sends no
/// welcome mail, and mints no tokens.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,

    /// Plain text password
    pub password: String,

    /// Display name
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    #[validate(custom(function = "validators::not_blank"))]
    pub full_name: String,

    /// Initial role
    #[serde(default)]
    pub role: UserRole,

    /// Initial verification state, chosen by the creator
    #[serde(default)]
    pub is_verified: bool,
}

/// Request body for an administrative user update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    /// New display name
    pub full_name: Option<String>,

    /// New email address
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// New role
    pub role: Option<UserRole>,

    /// New verification state
    pub is_verified: Option<bool>,
}

/// Request body for an administrative password override.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetUserPasswordRequest {
    /// The new plain text password
    pub new_password: String,
}

/// Listing parameters for the administrative user listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    /// Restrict to one role
    pub role: Option<UserRole>,

    /// Restrict by verification status
    pub is_verified: Option<bool>,

    /// Free-text search over email and full name
    pub search: Option<String>,

    /// 1-based page index. Default: `1`
    #[serde(default = "default_page")]
    pub page: u32,

    /// Page size. Default: `20`, capped at 100 by the service
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            role: None,
            is_verified: None,
            search: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Response returned after successful authentication.
///
/// # Example JSON
///
/// ```json
/// {
///   "accessToken": "eyJhbGciOiJIUzI1NiIs...",
///   "tokenType": "Bearer",
///   "expiresIn": 900,
///   "refreshToken": "9f86d081884c7d65...",
///   "user": { "id": "...", "email": "...", "isVerified": true }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Short-lived bearer credential
    pub access_token: String,
    /// Always the literal `Bearer`
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    /// Long-lived opaque refresh token
    pub refresh_token: String,
    /// Sanitised user projection (never includes the password hash)
    pub user: UserProfile,
}

impl AuthResponse {
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        user: UserProfile,
    ) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
            refresh_token,
            user,
        }
    }
}

/// Response returned after a role switch: a fresh access token carrying the
/// new role. The refresh token is untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRoleResponse {
    /// Access token carrying the newly active role
    pub access_token: String,
    /// Always the literal `Bearer`
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    /// Updated user projection
    pub user: UserProfile,
}

/// One page of the administrative user listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    /// The page of sanitised projections
    pub users: Vec<UserProfile>,
    /// Total number of users matching the filter
    pub total: i64,
    /// 1-based page index
    pub page: u32,
    /// Page size used
    pub page_size: u32,
    /// Total number of pages
    pub total_pages: u32,
}

// =============================================================================
// TESTS
// =============================================================================
