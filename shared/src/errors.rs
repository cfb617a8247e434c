//! # Identity Error Types
//!
//! Closed error taxonomy for the identity core. Every fallible operation in
//! the services and the store returns exactly one of these kinds; a transport
//! layer maps them to wire codes via [`AuthError::error_code`].
//!
//! ## Error Categories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          AuthError Categories                           │
//! ├────────────────────┬────────────────────┬───────────────────────────────┤
//! │ Credential         │ User existence     │ Token                         │
//! ├────────────────────┼────────────────────┼───────────────────────────────┤
//! │ InvalidCredentials │ UserNotFound       │ InvalidToken                  │
//! │ AccountNotVerified │ EmailAlreadyExists │ TokenExpired / TokenRevoked   │
//! │ AccountLocked      │ UserCreationFailed │ TokenNotFound                 │
//! │ AccountDisabled    │                    │ RefreshTokenInvalid           │
//! ├────────────────────┼────────────────────┼───────────────────────────────┤
//! │ Verification       │ Password           │ Authorization / Tenant        │
//! ├────────────────────┼────────────────────┼───────────────────────────────┤
//! │ *TokenInvalid      │ TooWeak / TooLong  │ Unauthorized / Forbidden      │
//! │ *TokenExpired      │ SameAsOld          │ InvalidRole / RoleNotAssigned │
//! │ AlreadyVerified    │ ResetToken*        │ TenantMismatch / NotFound     │
//! │ EmailFailed        │ CurrentIncorrect   │ TenantInactive                │
//! ├────────────────────┴────────────────────┴───────────────────────────────┤
//! │ Input (validation)        Store (sqlx)        General (internal)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//!
//! Store errors are wrapped with context for diagnostics but never
//! transcribed verbatim to the caller; they collapse into the `Query` /
//! `Connection` / `TransactionFailed` kinds at the service boundary.
//! Enumeration-sensitive flows (resend verification, forgot password) return
//! success on unknown accounts rather than a distinct error.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::errors::{AuthError, AuthResult};
//!
//! async fn load_user(id: Uuid) -> AuthResult<User> {
//!     store
//!         .find_user_by_id(id)
//!         .await?                       // Query -> store category
//!         .ok_or(AuthError::UserNotFound)
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for services and store adapters.
///
/// Use this instead of `Result<T, AuthError>` for cleaner signatures:
///
/// ```rust,ignore
/// async fn login(&self, req: LoginRequest) -> AuthResult<AuthResponse> { ... }
/// ```
pub type AuthResult<T> = Result<T, AuthError>;

// =============================================================================
// Main Error Enum
// =============================================================================

/// Identity-core error type.
///
/// Each variant represents one kind from the closed taxonomy. Variants carry
/// data only where a caller needs it for diagnostics; secrets never appear in
/// error payloads.
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Credential Errors
    // =========================================================================
    // The caller's credentials are wrong or the account state forbids login.
    // "Invalid credentials" deliberately covers both unknown email and wrong
    // password to prevent user enumeration.

    /// Wrong email/password combination (or unknown email).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists and the password matched, but the email address
    /// has not been verified yet.
    #[error("Account not verified")]
    AccountNotVerified,

    /// Account is administratively locked.
    #[error("Account locked")]
    AccountLocked,

    /// Account is administratively disabled.
    #[error("Account disabled")]
    AccountDisabled,

    // =========================================================================
    // User-Existence Errors
    // =========================================================================

    /// The target user does not exist (or is outside the caller's view).
    #[error("User not found")]
    UserNotFound,

    /// Registration or email change would collide with an existing account.
    /// Email comparison is case-insensitive.
    #[error("Email already exists")]
    EmailAlreadyExists,

    /// The store rejected the user insert for a reason other than the email
    /// uniqueness constraint.
    #[error("User creation failed")]
    UserCreationFailed,

    // =========================================================================
    // Token Errors
    // =========================================================================

    /// Token is malformed or fails signature/shape checks.
    #[error("Invalid or malformed token")]
    InvalidToken,

    /// Token exists but its expiry instant has passed (`now >= expires_at`).
    #[error("Token expired")]
    TokenExpired,

    /// Token exists but has been revoked.
    #[error("Token revoked")]
    TokenRevoked,

    /// No token row matches the presented string.
    #[error("Token not found")]
    TokenNotFound,

    /// Refresh token is unknown, expired, or revoked. Collapsed into one
    /// kind so callers cannot distinguish which.
    #[error("Refresh token invalid")]
    RefreshTokenInvalid,

    /// Minting an access token failed inside the codec.
    #[error("Token generation failed")]
    TokenGenerationFailed,

    // =========================================================================
    // Email-Verification Errors
    // =========================================================================

    /// Verification token is unknown.
    #[error("Verification token invalid")]
    VerificationTokenInvalid,

    /// Verification token exists but has expired.
    #[error("Verification token expired")]
    VerificationTokenExpired,

    /// The account is already verified; verification is a one-way latch.
    #[error("Email already verified")]
    AlreadyVerified,

    /// The verification email could not be dispatched. Fatal only in the
    /// resend flow; registration logs and continues.
    #[error("Verification email failed")]
    VerificationEmailFailed,

    // =========================================================================
    // Password Errors
    // =========================================================================

    /// New password does not meet the minimum strength policy.
    #[error("Password too weak")]
    PasswordTooWeak,

    /// Password exceeds the 72-octet hashing input bound.
    #[error("Password too long")]
    PasswordTooLong,

    /// New password matches the currently stored one.
    #[error("New password matches the old password")]
    PasswordSameAsOld,

    /// The supplied current password did not match.
    #[error("Current password incorrect")]
    CurrentPasswordIncorrect,

    /// Reset token is unknown.
    #[error("Reset token invalid")]
    ResetTokenInvalid,

    /// Reset token exists but has expired.
    #[error("Reset token expired")]
    ResetTokenExpired,

    /// Reset token has already been consumed. Distinct from expiry so a
    /// replayed token is reported accurately even before its expiry.
    #[error("Reset token already used")]
    ResetTokenUsed,

    /// The password-reset email could not be dispatched.
    #[error("Reset email failed")]
    ResetEmailFailed,

    // =========================================================================
    // Authorization Errors
    // =========================================================================

    /// Caller identity does not own the target resource.
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller is authenticated but the action is not permitted.
    #[error("Forbidden")]
    Forbidden,

    /// The requested role is not part of the closed role set.
    #[error("Invalid role: {role}")]
    InvalidRole {
        /// The rejected role string
        role: String,
    },

    /// The requested role is not assigned to the user.
    #[error("Role not assigned")]
    RoleNotAssigned,

    // =========================================================================
    // Input Errors
    // =========================================================================

    /// Email field fails shape validation.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Request DTO failed `validator` rules. Field-level detail is carried
    /// for diagnostics.
    #[error("Invalid input")]
    Validation(#[from] ValidationErrors),

    /// Generic invalid-input with a custom message.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable description of what is wrong
        message: String,
    },

    /// A required field is empty or missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
    },

    // =========================================================================
    // Store Errors
    // =========================================================================
    // Logged at ERROR level; details are never exposed to clients.

    /// The store could not be reached.
    #[error("Store connection error: {message}")]
    Connection {
        /// Internal diagnostic message (not for clients)
        message: String,
    },

    /// A store query failed. Wraps `sqlx::Error`.
    #[error("Store query error")]
    Query(#[from] sqlx::Error),

    /// A multi-statement store operation failed partway.
    #[error("Store transaction failed")]
    TransactionFailed,

    // =========================================================================
    // Tenant Errors
    // =========================================================================

    /// The named tenant does not exist.
    #[error("Tenant not found")]
    TenantNotFound,

    /// The named tenant exists but is inactive.
    #[error("Tenant inactive")]
    TenantInactive,

    /// The target user belongs to a different tenant than the caller
    /// asserted.
    #[error("Tenant mismatch")]
    TenantMismatch,

    // =========================================================================
    // General Errors
    // =========================================================================

    /// Unspecified internal error. Last resort.
    #[error("Internal error")]
    Internal {
        /// Internal message for logging (not exposed to clients)
        message: String,
    },

    /// A collaborating service (mail relay, etc.) is down.
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        /// Name of the unavailable service
        service: &'static str,
    },

    /// The operation could not be completed.
    #[error("Operation failed")]
    OperationFailed,
}

// =============================================================================
// Error Methods
// =============================================================================

impl AuthError {
    /// Returns a stable machine-readable code for this error kind.
    ///
    /// Codes are SCREAMING_SNAKE_CASE and form the contract a transport maps
    /// to its wire representation. They never change for a given kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            // Credential
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            // User existence
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::UserCreationFailed => "USER_CREATION_FAILED",
            // Token
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::RefreshTokenInvalid => "REFRESH_TOKEN_INVALID",
            Self::TokenGenerationFailed => "TOKEN_GENERATION_FAILED",
            // Verification
            Self::VerificationTokenInvalid => "VERIFICATION_TOKEN_INVALID",
            Self::VerificationTokenExpired => "VERIFICATION_TOKEN_EXPIRED",
            Self::AlreadyVerified => "ALREADY_VERIFIED",
            Self::VerificationEmailFailed => "VERIFICATION_EMAIL_FAILED",
            // Password
            Self::PasswordTooWeak => "PASSWORD_TOO_WEAK",
            Self::PasswordTooLong => "PASSWORD_TOO_LONG",
            Self::PasswordSameAsOld => "PASSWORD_SAME_AS_OLD",
            Self::CurrentPasswordIncorrect => "CURRENT_PASSWORD_INCORRECT",
            Self::ResetTokenInvalid => "RESET_TOKEN_INVALID",
            Self::ResetTokenExpired => "RESET_TOKEN_EXPIRED",
            Self::ResetTokenUsed => "RESET_TOKEN_USED",
            Self::ResetEmailFailed => "RESET_EMAIL_FAILED",
            // Authorization
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidRole { .. } => "INVALID_ROLE",
            Self::RoleNotAssigned => "ROLE_NOT_ASSIGNED",
            // Input
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::Validation(_) => "INVALID_INPUT",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::MissingField { .. } => "MISSING_REQUIRED_FIELD",
            // Store
            Self::Connection { .. } => "STORE_CONNECTION_ERROR",
            Self::Query(_) => "STORE_QUERY_ERROR",
            Self::TransactionFailed => "STORE_TRANSACTION_FAILED",
            // Tenant
            Self::TenantNotFound => "TENANT_NOT_FOUND",
            Self::TenantInactive => "TENANT_INACTIVE",
            Self::TenantMismatch => "TENANT_MISMATCH",
            // General
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::OperationFailed => "OPERATION_FAILED",
        }
    }

    /// Returns `true` for server-side errors.
    ///
    /// Server errors are logged at ERROR level and must not expose internal
    /// detail to clients. Everything else is a caller error logged at WARN.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Query(_)
                | Self::TransactionFailed
                | Self::Internal { .. }
                | Self::ServiceUnavailable { .. }
                | Self::OperationFailed
                | Self::TokenGenerationFailed
                | Self::VerificationEmailFailed
                | Self::ResetEmailFailed
                | Self::UserCreationFailed
        )
    }
}

// =============================================================================
// Response Structure
// =============================================================================

/// Serializable error body a transport can emit for an [`AuthError`].
///
/// The core does not speak HTTP itself; this structure is the neutral shape
/// transports share so error payloads stay consistent across surfaces.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code for programmatic handling
    pub code: String,

    /// Human-readable message (for debugging, not for user display)
    pub message: String,

    /// Additional error details (field-level validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// When the error occurred (ISO 8601 format)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    /// Creates a response body from an error, hiding internal detail for
    /// server-side kinds.
    pub fn new(error: &AuthError) -> Self {
        let message = if error.is_server_error() {
            // Internal detail stays in the logs
            "Internal server error".to_string()
        } else {
            error.to_string()
        };

        let details = match error {
            AuthError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message,
            details,
            timestamp: chrono::Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_error_codes_are_stable() {
        assert_eq!(AuthError::InvalidCredentials.error_code(), "INVALID_CREDENTIALS");
        assert_eq!(AuthError::AccountNotVerified.error_code(), "ACCOUNT_NOT_VERIFIED");
        assert_eq!(AuthError::AccountLocked.error_code(), "ACCOUNT_LOCKED");
        assert_eq!(AuthError::AccountDisabled.error_code(), "ACCOUNT_DISABLED");
    }

    #[test]
    fn reset_token_kinds_are_distinct() {
        // Expired and used must be distinguishable to the caller
        assert_ne!(
            AuthError::ResetTokenExpired.error_code(),
            AuthError::ResetTokenUsed.error_code()
        );
        assert_ne!(
            AuthError::ResetTokenExpired.error_code(),
            AuthError::ResetTokenInvalid.error_code()
        );
    }

    #[test]
    fn store_errors_are_server_errors() {
        assert!(AuthError::TransactionFailed.is_server_error());
        assert!(AuthError::Connection { message: "refused".into() }.is_server_error());
        assert!(AuthError::Internal { message: "x".into() }.is_server_error());
        assert!(!AuthError::InvalidCredentials.is_server_error());
        assert!(!AuthError::TenantMismatch.is_server_error());
    }

    #[test]
    fn server_error_responses_hide_detail() {
        let err = AuthError::Internal { message: "pool exhausted at 10.0.0.3".into() };
        let body = ErrorResponse::new(&err);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.message.contains("10.0.0.3"));
    }

    #[test]
    fn client_error_responses_keep_message() {
        let err = AuthError::TenantMismatch;
        let body = ErrorResponse::new(&err);
        assert_eq!(body.code, "TENANT_MISMATCH");
        assert_eq!(body.message, "Tenant mismatch");
    }

    #[test]
    fn invalid_role_carries_the_rejected_value() {
        let err = AuthError::InvalidRole { role: "wizard".into() };
        assert_eq!(err.error_code(), "INVALID_ROLE");
        assert!(err.to_string().contains("wizard"));
    }
}
