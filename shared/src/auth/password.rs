//! # Password Hashing with Argon2id
//!
//! Secure password storage using the Argon2id algorithm.
//!
//! Argon2 won the [Password Hashing Competition](https://www.password-hashing.net/)
//! and is recommended by [OWASP](https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html).
//! We use the **Argon2id** variant, which resists both GPU and side-channel
//! attacks.
//!
//! ## Security Parameters (OWASP Recommended)
//!
//! | Parameter | Value | Purpose |
//! |-----------|-------|---------|
//! | Memory | 64 MiB | Makes attacks expensive (GPU memory) |
//! | Iterations | 3 | Time cost (slows brute force) |
//! | Parallelism | 4 | CPU lanes (matches typical cores) |
//! | Output | 32 bytes | Hash length |
//!
//! Hashes are stored in [PHC string format](https://github.com/P-H-C/phc-string-format):
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>
//! ```
//!
//! ## Input Bound
//!
//! Plaintext input is bounded to [`MAX_PASSWORD_BYTES`] octets. Inputs past
//! the bound fail with `AuthError::PasswordTooLong` rather than being
//! silently truncated.
//!
//! ## Security Notes
//!
//! - **Never store plaintext passwords**
//! - **Each hash includes a unique salt** - same password, different hashes
//! - **Verification is constant-time** - no prefix-match timing oracle

use crate::errors::AuthError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Maximum accepted plaintext length in octets.
///
/// Inherited from the bcrypt-era input bound; longer inputs are rejected
/// with a distinct error instead of being truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Minimum accepted plaintext length in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

// =============================================================================
// Password Hasher
// =============================================================================

/// Secure password hashing service using Argon2id.
///
/// ## Thread Safety
///
/// This type is `Clone` and `Send + Sync`, safe for concurrent use.
/// Each hash operation generates a new random salt.
///
/// ## Example
///
/// ```rust,ignore
/// let hasher = PasswordHasher::new();
///
/// let hash = hasher.hash("MySecureP@ssw0rd!")?;
/// let is_valid = hasher.verify("MySecureP@ssw0rd!", &hash)?;
/// ```
#[derive(Clone)]
pub struct PasswordHasher {
    /// Pre-configured Argon2 instance
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    /// Creates a new hasher with OWASP-recommended parameters.
    pub fn new() -> Self {
        // OWASP-recommended parameters for password hashing
        let params = Params::new(
            64 * 1024, // 64 MiB memory cost
            3,         // 3 iterations (time cost)
            4,         // 4 lanes (parallelism)
            None,      // Default output length (32 bytes)
        )
        .expect("Invalid Argon2 params"); // Safe: these params are always valid

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Self { argon2 }
    }

    /// Hashes a password for secure storage.
    ///
    /// ## Returns
    ///
    /// A PHC-formatted string containing the algorithm, version, parameters,
    /// salt, and hash.
    ///
    /// ## Errors
    ///
    /// - `AuthError::PasswordTooLong` if the input exceeds 72 octets
    /// - `AuthError::Internal` if hashing fails (rare)
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::PasswordTooLong);
        }

        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal {
                message: format!("Password hashing failed: {}", e),
            })
    }

    /// Verifies a password against a stored hash in constant time.
    ///
    /// ## Returns
    ///
    /// - `Ok(true)` - password matches
    /// - `Ok(false)` - password does not match
    ///
    /// ## Errors
    ///
    /// - `AuthError::PasswordTooLong` if the input exceeds 72 octets
    /// - `AuthError::Internal` on an unparseable stored hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::PasswordTooLong);
        }

        let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Internal {
            message: format!("Invalid password hash format: {}", e),
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal {
                message: format!("Password verification failed: {}", e),
            }),
        }
    }
}

// Implement Debug manually to avoid exposing internal state
impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

// =============================================================================
// Strength Policy
// =============================================================================

/// Checks a candidate password against the platform strength policy.
///
/// The bounds are deliberately simple: a length floor and the hashing input
/// ceiling. Character-class composition rules are a product decision left to
/// the clients.
///
/// ## Errors
///
/// - `AuthError::PasswordTooWeak` below [`MIN_PASSWORD_CHARS`] characters
/// - `AuthError::PasswordTooLong` above [`MAX_PASSWORD_BYTES`] octets
pub fn validate_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::PasswordTooWeak);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::PasswordTooLong);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_correct_password() {
        let hasher = PasswordHasher::new();
        let password = "MySecureP@ssw0rd!";

        let hash = hasher.hash(password).unwrap();

        // Hash should be different from plaintext
        assert_ne!(hash, password);

        assert!(hasher.verify(password, &hash).unwrap());
    }

    #[test]
    fn verify_wrong_password() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("MySecureP@ssw0rd!").unwrap();

        assert!(!hasher.verify("WrongP@ssw0rd!", &hash).unwrap());
    }

    #[test]
    fn different_hashes_for_same_password() {
        let hasher = PasswordHasher::new();
        let password = "MySecureP@ssw0rd!";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        // Each hash should be unique due to random salt
        assert_ne!(hash1, hash2);

        assert!(hasher.verify(password, &hash1).unwrap());
        assert!(hasher.verify(password, &hash2).unwrap());
    }

    #[test]
    fn hash_is_phc_format() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("TestP@ssw0rd!").unwrap();

        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn exactly_72_octets_hashes_and_verifies() {
        let hasher = PasswordHasher::new();
        let password = "a".repeat(MAX_PASSWORD_BYTES);
        assert_eq!(password.len(), 72);

        let hash = hasher.hash(&password).unwrap();
        assert!(hasher.verify(&password, &hash).unwrap());
    }

    #[test]
    fn seventy_three_octets_is_too_long() {
        let hasher = PasswordHasher::new();
        let password = "a".repeat(MAX_PASSWORD_BYTES + 1);

        assert!(matches!(hasher.hash(&password), Err(AuthError::PasswordTooLong)));
        assert!(matches!(
            hasher.verify(&password, "$argon2id$whatever"),
            Err(AuthError::PasswordTooLong)
        ));
    }

    #[test]
    fn strength_policy_floor_and_ceiling() {
        assert!(matches!(
            validate_strength("short"),
            Err(AuthError::PasswordTooWeak)
        ));
        assert!(validate_strength("pw-ABC-123!").is_ok());
        assert!(validate_strength(&"a".repeat(72)).is_ok());
        assert!(matches!(
            validate_strength(&"a".repeat(73)),
            Err(AuthError::PasswordTooLong)
        ));
    }
}
