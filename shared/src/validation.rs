//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! Service operations validate their request DTOs for shape as the first
//! step; a failed validation surfaces as `AuthError::Validation` with
//! field-level details attached.
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct RegisterRequest {
//!     #[validate(email)]
//!     email: String,
//!
//!     #[validate(custom(function = "validators::not_blank"))]
//!     full_name: String,
//! }
//! ```

use crate::errors::AuthError;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// ## Example
///
/// ```rust,ignore
/// pub async fn register(&self, req: RegisterRequest) -> AuthResult<AuthResponse> {
///     validate_request(&req)?;  // Returns early if invalid
///     // Continue with validated data
/// }
/// ```
///
/// ## Errors
///
/// Returns `AuthError::Validation` with field-level details if validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), AuthError> {
    data.validate().map_err(AuthError::Validation)
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
///
/// These functions follow the validator crate's signature:
/// `fn(&T) -> Result<(), ValidationError>`
pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
