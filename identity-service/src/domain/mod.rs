//! Domain layer: entities, projections, and filter types.

pub mod entities;

pub use entities::{
    NewUser, PasswordResetToken, RefreshToken, TenantMembership, User, UserFilter, UserProfile,
    UserRole, VerificationToken,
};
