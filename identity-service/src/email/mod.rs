//! # Email Sink
//!
//! Outbound-mail port for the two messages the identity core sends:
//!
//! 1. **Welcome / verification** - carries the email-verification link
//! 2. **Password reset** - carries the reset link
//!
//! Both are fire-and-possibly-fail. A failed welcome mail never aborts a
//! successful registration (the verification record is already durable and
//! the user can request a resend); a failed reset mail is swallowed behind
//! the forgot-password flow's unconditional success.
//!
//! The production adapter is [`SmtpMailer`](smtp::SmtpMailer) (lettre over
//! async SMTP). Tests mock this trait.

use async_trait::async_trait;
use shared::errors::AuthResult;
use std::sync::Arc;

pub mod smtp;

pub use smtp::SmtpMailer;

/// Outbound-mail port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the welcome message with an email-verification link.
    async fn send_welcome(
        &self,
        to: &str,
        full_name: &str,
        verification_token: &str,
    ) -> AuthResult<()>;

    /// Sends the password-reset message with a reset link.
    async fn send_password_reset(
        &self,
        to: &str,
        full_name: &str,
        reset_token: &str,
    ) -> AuthResult<()>;
}

/// Arc wrapper for thread-safe sharing across services.
pub type SharedMailer = Arc<dyn Mailer>;

// =============================================================================
// TEMPLATES
// =============================================================================

/// Email bodies for the identity flows, in HTML and plain text.
pub mod templates {
    /// HTML body for the welcome/verification email.
    pub fn welcome_html(full_name: &str, verification_url: &str, expiry_hours: i64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Welcome to Atheneum</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Welcome, {full_name}!</h1>
    <p>Thanks for joining Atheneum. Please confirm your email address to activate your account:</p>
    <p style="text-align: center;">
        <a href="{verification_url}" style="display: inline-block; background-color: #4F46E5; color: white; text-decoration: none; padding: 12px 30px; border-radius: 6px; font-weight: 600;">Verify Email</a>
    </p>
    <p>Or copy and paste this link into your browser:</p>
    <p style="word-break: break-all; color: #4F46E5;">{verification_url}</p>
    <p><strong>This link will expire in {expiry_hours} hours.</strong></p>
    <p>If you did not create an account, please ignore this email.</p>
</body>
</html>"#,
            full_name = full_name,
            verification_url = verification_url,
            expiry_hours = expiry_hours
        )
    }

    /// Plain-text body for the welcome/verification email.
    pub fn welcome_text(full_name: &str, verification_url: &str, expiry_hours: i64) -> String {
        format!(
            r#"Welcome, {full_name}!

Thanks for joining Atheneum. Please confirm your email address to activate your account:

{verification_url}

This link will expire in {expiry_hours} hours.

If you did not create an account, please ignore this email."#,
            full_name = full_name,
            verification_url = verification_url,
            expiry_hours = expiry_hours
        )
    }

    /// HTML body for the password-reset email.
    pub fn password_reset_html(full_name: &str, reset_url: &str, expiry_minutes: i64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Reset Your Password</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Reset Your Password</h1>
    <p>Hi {full_name},</p>
    <p>We received a request to reset your password. Click the button below to choose a new one:</p>
    <p style="text-align: center;">
        <a href="{reset_url}" style="display: inline-block; background-color: #DC2626; color: white; text-decoration: none; padding: 12px 30px; border-radius: 6px; font-weight: 600;">Reset Password</a>
    </p>
    <p>Or copy and paste this link into your browser:</p>
    <p style="word-break: break-all; color: #DC2626;">{reset_url}</p>
    <p><strong>This link will expire in {expiry_minutes} minutes.</strong></p>
    <p><strong>Security notice:</strong> if you did not request a password reset, ignore this email. Your password will remain unchanged.</p>
</body>
</html>"#,
            full_name = full_name,
            reset_url = reset_url,
            expiry_minutes = expiry_minutes
        )
    }

    /// Plain-text body for the password-reset email.
    pub fn password_reset_text(full_name: &str, reset_url: &str, expiry_minutes: i64) -> String {
        format!(
            r#"Reset Your Password

Hi {full_name},

We received a request to reset your password. Open the link below to choose a new one:

{reset_url}

This link will expire in {expiry_minutes} minutes.

SECURITY NOTICE: if you did not request a password reset, ignore this email. Your password will remain unchanged."#,
            full_name = full_name,
            reset_url = reset_url,
            expiry_minutes = expiry_minutes
        )
    }

}
