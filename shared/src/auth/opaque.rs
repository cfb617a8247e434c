//! # Opaque Token Source
//!
//! Produces the high-entropy opaque strings used for the refresh,
//! email-verification, and password-reset token families.
//!
//! Tokens are 32 bytes (256 bits) from the operating system's CSPRNG,
//! hex-encoded so they are URL-safe. If the entropy source transiently
//! fails, generation falls back to a v4 UUID rather than denying the
//! operation; the fallback is logged as a degraded mode so operators can
//! alert on it.

use rand::{rngs::OsRng, RngCore};
use tracing::warn;
use uuid::Uuid;

/// Number of random bytes per token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Generates a new opaque token string.
///
/// The result is 64 lowercase hex characters in the normal path, or a
/// 32-character UUID (simple format) in the degraded fallback path.
pub fn new_opaque_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => hex::encode(bytes),
        Err(e) => {
            // Degraded mode: a UUID still avoids denial of registration,
            // but carries less entropy and must be visible in monitoring
            warn!(error = %e, "OS entropy source failed, falling back to UUID token");
            Uuid::new_v4().simple().to_string()
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
    fn tokens_are_256_bits_hex_encoded() {
        let token = new_opaque_token();
        assert_eq!(token.len(), 64); // 32 bytes = 64 hex chars
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_opaque_token();
        let b = new_opaque_token();
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_are_url_safe() {
        let token = new_opaque_token();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
