//! # Identity Domain Entities
//!
//! Core entities for user identity, credential state, and the three
//! persisted token families. Entities map directly to database tables.
//!
//! ## Entity Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Domain Entities                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────┐          ┌──────────────────────────┐          │
//! │  │        User         │          │    TenantMembership      │          │
//! │  ├─────────────────────┤  looked  ├──────────────────────────┤          │
//! │  │ - id (PK)           │───up by──│ - user_id                │          │
//! │  │ - tenant_id (null.) │          │ - tenant_id              │          │
//! │  │ - email (ci unique) │          │ - role                   │          │
//! │  │ - password_hash     │          │ - is_active              │          │
//! │  │ - role              │          └──────────────────────────┘          │
//! │  │ - is_verified       │                                                │
//! │  └─────────┬───────────┘                                                │
//! │            │ owns (cascade delete)                                      │
//! │            ▼                                                            │
//! │  ┌───────────────────┐ ┌────────────────────┐ ┌─────────────────────┐   │
//! │  │ VerificationToken │ │ PasswordResetToken │ │    RefreshToken     │   │
//! │  ├───────────────────┤ ├────────────────────┤ ├─────────────────────┤   │
//! │  │ consumed on use   │ │ used_at = consumed │ │ revoked_at, multi-  │   │
//! │  │ (row deleted)     │ │ (single use)       │ │ session, revocable  │   │
//! │  └───────────────────┘ └────────────────────┘ └─────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Token Family Semantics
//!
//! | Family | Consumption | Passive death |
//! |--------|-------------|---------------|
//! | [`VerificationToken`] | deleted on first successful use | `now >= expires_at` |
//! | [`PasswordResetToken`] | `used_at` stamped, never reusable | `now >= expires_at` |
//! | [`RefreshToken`] | not single-use; valid until revoked | `now >= expires_at` |
//!
//! ## Security Considerations
//!
//! - **Never expose `password_hash`**: use [`UserProfile`] for responses
//! - **Token strings are high-entropy opaque values**; they never appear in
//!   logs or error payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::AuthError;
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// USER ROLE
// =============================================================================

/// Closed, ordered role set.
///
/// Ordering reflects privilege: `Student < Instructor < Admin < SuperAdmin`.
/// The set is extensible but finite; any attempt to set a role outside it is
/// rejected with `AuthError::InvalidRole`.
///
/// # Database Representation
///
/// Stored as the PostgreSQL enum `user_role` with snake_case values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Default role for learners
    Student,
    /// Content creators who run courses
    Instructor,
    /// Tenant administrators
    Admin,
    /// Platform operators
    SuperAdmin,
}

impl UserRole {
    /// Returns all roles in ascending privilege order.
    pub fn all() -> &'static [UserRole] {
        &[
            UserRole::Student,
            UserRole::Instructor,
            UserRole::Admin,
            UserRole::SuperAdmin,
        ]
    }

    /// Returns the canonical string form (matches storage and wire).
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Student
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            "super_admin" => Ok(UserRole::SuperAdmin),
            other => Err(AuthError::InvalidRole { role: other.to_string() }),
        }
    }
}

// =============================================================================
// USER ENTITY
// =============================================================================

/// Complete user entity as stored in the database.
///
/// Contains sensitive fields (`password_hash`); **never expose this struct
/// directly** - convert to [`UserProfile`] for anything caller-facing.
///
/// `tenant_id` is nullable: freshly registered users may exist in a
/// pre-tenant state and get their tenant resolved at login through the
/// membership registry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: Uuid,
    /// Tenant binding; `None` for pre-tenant accounts
    pub tenant_id: Option<Uuid>,
    /// Email address. Unique case-insensitively; original casing preserved
    /// for display.
    pub email: String,
    /// Argon2id password hash in PHC format
    pub password_hash: String,
    /// User's display name
    pub full_name: String,
    /// Active role
    pub role: UserRole,
    /// Whether the email address has been verified. Monotonic latch in the
    /// normal flow; only the administrative unverify path clears it.
    pub is_verified: bool,
    /// Account is administratively locked (login refused)
    pub is_locked: bool,
    /// Account is administratively disabled (login refused)
    pub is_disabled: bool,
    /// User must change their password at next login
    pub force_password_change: bool,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new user.
///
/// `password_hash` must already be hashed; plain passwords never reach the
/// store.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Tenant binding, if known at creation time
    pub tenant_id: Option<Uuid>,
    /// Email address (checked unique, case-insensitively)
    pub email: String,
    /// Pre-hashed password (Argon2id PHC string)
    pub password_hash: String,
    /// Display name
    pub full_name: String,
    /// Initial role
    pub role: UserRole,
    /// Initial verification state. Self-registration always starts `false`;
    /// administrative creation may choose `true`.
    pub is_verified: bool,
}

// =============================================================================
// USER PROFILE (SANITISED PROJECTION)
// =============================================================================

/// Public user projection without credential material.
///
/// This is the only user shape that leaves the services. It excludes the
/// password hash and the reserved account flags.
///
/// # JSON Serialization
///
/// Fields are serialized as camelCase; `tenantId` is omitted entirely for
/// pre-tenant users:
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "tenantId": "8c1a2f60-0b3f-4f7e-9a2d-1f4f5a6b7c8d",
///   "email": "user@example.com",
///   "fullName": "Ada Lovelace",
///   "role": "student",
///   "isVerified": true,
///   "createdAt": "2026-01-01T00:00:00Z",
///   "updatedAt": "2026-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Unique user identifier
    pub id: Uuid,
    /// Tenant binding; absent for pre-tenant accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    /// User's email address
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Active role
    pub role: UserRole,
    /// Email verification status
    pub is_verified: bool,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// =============================================================================
// TOKEN FAMILIES
// =============================================================================

/// Email-verification token. Consumed (deleted) on first successful use.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    /// Unique token identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Opaque high-entropy token string
    pub token: String,
    /// Expiry instant; `now >= expires_at` counts as expired
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// A token at exactly its expiry instant is already expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Password-reset token. Single-use: a non-null `used_at` means consumed
/// and the token can never be consumed again, even before expiry.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    /// Unique token identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Opaque high-entropy token string
    pub token: String,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Consumption timestamp; `None` while fresh
    pub used_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Refresh token. Not single-use: its presence, unrevoked and unexpired,
/// authorises new access tokens until explicitly revoked.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    /// Unique token identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Opaque high-entropy token string
    pub token: String,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Revocation timestamp; `None` while active
    pub revoked_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// A token is valid iff it is unrevoked and its expiry is in the future.
    pub fn is_valid(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}

// =============================================================================
// TENANT MEMBERSHIP
// =============================================================================

/// Membership registry entry.
///
/// Consulted only when a user's own `tenant_id` is null, to resolve a
/// tenant (and role) at login or role switch. Memberships are weakly
/// referenced: the user aggregate does not own them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TenantMembership {
    /// Member user
    pub user_id: Uuid,
    /// Tenant the membership grants access to
    pub tenant_id: Uuid,
    /// Role held within that tenant
    pub role: UserRole,
    /// Inactive memberships are ignored by lookups
    pub is_active: bool,
}

// =============================================================================
// LIST FILTERING
// =============================================================================

/// Filter descriptor for the store's user listing.
///
/// All fields are optional and combine with AND. The store guarantees
/// results never leak across tenants when `tenant_id` is present; services
/// re-filter defensively on top.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Restrict to one tenant (pre-tenant users included)
    pub tenant_id: Option<Uuid>,
    /// Restrict to one role
    pub role: Option<UserRole>,
    /// Restrict by verification status
    pub is_verified: Option<bool>,
    /// Free-text search over email and full name (case-insensitive)
    pub search: Option<String>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_ordering_follows_privilege() {
        assert!(UserRole::Student < UserRole::Instructor);
        assert!(UserRole::Instructor < UserRole::Admin);
        assert!(UserRole::Admin < UserRole::SuperAdmin);
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in UserRole::all() {
            let parsed: UserRole = role.as_str().parse().unwrap();
            assert_eq!(parsed, *role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = "janitor".parse::<UserRole>();
        assert!(matches!(result, Err(AuthError::InvalidRole { .. })));
    }

    #[test]
    fn profile_never_serializes_the_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: None,
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: "Ada".into(),
            role: UserRole::Student,
            is_verified: false,
            is_locked: false,
            is_disabled: false,
            force_password_change: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile: UserProfile = user.into();
        let json = serde_json::to_string(&profile).unwrap();

        assert!(!json.contains("argon2id"));
        assert!(!json.contains("passwordHash"));
        // Pre-tenant profile omits tenantId entirely
        assert!(!json.contains("tenantId"));
        assert!(json.contains("\"email\":\"ada@example.com\""));
    }

    #[test]
    fn verification_token_at_expiry_instant_is_expired() {
        let token = VerificationToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        // now >= expires_at by the time we check
        assert!(token.is_expired());
    }

    #[test]
    fn verification_token_in_the_future_is_fresh() {
        let token = VerificationToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(!token.is_expired());
    }

    #[test]
    fn refresh_token_validity_requires_unrevoked_and_unexpired() {
        let mut token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: Utc::now() + Duration::days(7),
            revoked_at: None,
            created_at: Utc::now(),
        };
        assert!(token.is_valid());

        token.revoked_at = Some(Utc::now());
        assert!(!token.is_valid());

        token.revoked_at = None;
        token.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!token.is_valid());
    }

    #[test]
    fn used_reset_token_stays_used() {
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: Utc::now() + Duration::hours(1),
            used_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        // Consumed even though not yet expired
        assert!(token.is_used());
        assert!(!token.is_expired());
    }
}
