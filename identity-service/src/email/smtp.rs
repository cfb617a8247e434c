//! # SMTP Mailer Adapter
//!
//! lettre-backed implementation of [`Mailer`] with TLS support.
//!
//! When no relay host is configured the adapter runs in development mode:
//! outbound messages are logged instead of sent, so local environments work
//! without an SMTP relay.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use shared::config::{SmtpConfig, TokenExpiryConfig};
use shared::errors::{AuthError, AuthResult};
use tracing::{error, info, warn};

use crate::email::{templates, Mailer};

/// SMTP mailer for the identity flows.
pub struct SmtpMailer {
    config: SmtpConfig,
    /// Link expiries rendered into the mail bodies
    expiry: TokenExpiryConfig,
    /// `None` in development mode (no relay configured)
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    /// Creates a new mailer.
    ///
    /// With an empty relay host the mailer starts in development mode and
    /// logs outbound messages instead of sending them.
    pub fn new(config: SmtpConfig, expiry: TokenExpiryConfig) -> AuthResult<Self> {
        if !config.is_configured() {
            warn!("SMTP not configured, outbound mail will only be logged");
            return Ok(Self { config, expiry, transport: None });
        }

        let transport = Self::build_transport(&config)?;

        info!(
            host = %config.host,
            port = %config.port,
            tls = %config.use_tls,
            "SMTP mailer initialized"
        );

        Ok(Self { config, expiry, transport: Some(transport) })
    }

    fn build_transport(config: &SmtpConfig) -> AuthResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                AuthError::Internal { message: format!("Failed to create SMTP transport: {}", e) }
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let creds = Credentials::new(username.clone(), password.clone());
            builder = builder.credentials(creds);
        }

        Ok(builder.build())
    }

    fn build_message(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
        text_body: String,
    ) -> AuthResult<Message> {
        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| AuthError::Internal {
                    message: format!("Invalid from address: {}", e),
                })?;

        let to_mailbox: Mailbox = to.parse().map_err(|_| AuthError::InvalidEmail)?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| AuthError::Internal { message: format!("Failed to build email: {}", e) })
    }

    async fn dispatch(&self, message: Message, to: &str, subject: &str) -> AuthResult<()> {
        let transport = match &self.transport {
            Some(t) => t,
            None => {
                info!(to = %to, subject = %subject, "[DEV] Email would be sent (SMTP not configured)");
                return Ok(());
            }
        };

        match transport.send(message).await {
            Ok(response) => {
                info!(to = %to, subject = %subject, code = ?response.code(), "Email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %to, subject = %subject, error = %e, "Failed to send email");
                Err(AuthError::ServiceUnavailable { service: "smtp" })
            }
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_welcome(
        &self,
        to: &str,
        full_name: &str,
        verification_token: &str,
    ) -> AuthResult<()> {
        let url = format!(
            "{}/verify-email?token={}",
            self.config.link_base_url, verification_token
        );
        let expiry_hours = (self.expiry.verify_token_expiry_seconds / 3600) as i64;

        let subject = "Welcome to Atheneum - verify your email";
        let message = self.build_message(
            to,
            subject,
            templates::welcome_html(full_name, &url, expiry_hours),
            templates::welcome_text(full_name, &url, expiry_hours),
        )?;

        self.dispatch(message, to, subject).await
    }

    async fn send_password_reset(
        &self,
        to: &str,
        full_name: &str,
        reset_token: &str,
    ) -> AuthResult<()> {
        let url = format!(
            "{}/reset-password?token={}",
            self.config.link_base_url, reset_token
        );
        let expiry_minutes = (self.expiry.reset_token_expiry_seconds / 60) as i64;

        let subject = "Reset your Atheneum password";
        let message = self.build_message(
            to,
            subject,
            templates::password_reset_html(full_name, &url, expiry_minutes),
            templates::password_reset_text(full_name, &url, expiry_minutes),
        )?;

        self.dispatch(message, to, subject).await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> SmtpConfig {
        SmtpConfig {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from_email: "no-reply@atheneum.io".into(),
            from_name: "Atheneum".into(),
            use_tls: true,
            link_base_url: "http://localhost:3000".into(),
        }
    }

    #[test]
    fn unconfigured_mailer_starts_in_dev_mode() {
        let mailer = SmtpMailer::new(dev_config(), TokenExpiryConfig::default()).unwrap();
        assert!(mailer.transport.is_none());
    }

    #[tokio::test]
    async fn dev_mode_send_succeeds_without_a_relay() {
        let mailer = SmtpMailer::new(dev_config(), TokenExpiryConfig::default()).unwrap();

        mailer.send_welcome("ada@x.io", "Ada", "token123").await.unwrap();
        mailer.send_password_reset("ada@x.io", "Ada", "token456").await.unwrap();
    }

    #[test]
    fn invalid_recipient_is_an_input_error() {
        let mailer = SmtpMailer::new(dev_config(), TokenExpiryConfig::default()).unwrap();
        let result = mailer.build_message("not-an-email", "s", "h".into(), "t".into());
        assert!(matches!(result, Err(AuthError::InvalidEmail)));
    }
}
