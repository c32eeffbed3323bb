//! Outgoing account emails.
//!
//! The service only depends on [`NotificationPort`]. [`LogNotifier`] renders the
//! messages and writes them to the log, which is what development and the CLI use.

use async_trait::async_trait;

use common::AppResult;
use domain::User;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Email subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Email asking the user to confirm their address.
    pub fn verification(user: &User, token: &str, base_url: &str) -> Self {
        let link = format!(
            "{}/verify-email/{}/{}",
            base_url.trim_end_matches('/'),
            user.id,
            token
        );
        Self::new(
            &user.email,
            "Verify your email address",
            format!(
                "Hello {},\n\nPlease confirm your email address by visiting:\n{}\n",
                user.nickname, link
            ),
        )
    }

    /// Email confirming that the password was changed.
    pub fn password_reset_confirmation(user: &User) -> Self {
        Self::new(
            &user.email,
            "Your password was changed",
            format!(
                "Hello {},\n\nThe password for your account was just reset. \
                 If this wasn't you, contact support immediately.\n",
                user.nickname
            ),
        )
    }
}

/// Side-effect emails sent by the account service.
///
/// Delivery is best effort: the account state change has already been
/// persisted when these are called.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn send_verification_email(&self, user: &User, token: &str) -> AppResult<()>;

    async fn send_password_reset_confirmation(&self, user: &User) -> AppResult<()>;
}

/// Logs emails instead of delivering them.
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn log(&self, message: &EmailMessage) {
        tracing::info!(to = %message.to, subject = %message.subject, "Email not sent (log delivery)");
        // Bodies carry verification links
        tracing::debug!(body = %message.body, "Email body");
    }
}

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AppResult<()> {
        self.log(&EmailMessage::verification(user, token, &self.base_url));
        Ok(())
    }

    async fn send_password_reset_confirmation(&self, user: &User) -> AppResult<()> {
        self.log(&EmailMessage::password_reset_confirmation(user));
        Ok(())
    }
}
