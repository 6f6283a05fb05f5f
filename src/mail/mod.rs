// [rust] Outgoing email: the Mailer seam, its SMTP and log-only implementations, and templates
pub mod templates;

pub use templates::{reset_password_email, RenderedEmail};

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, credentials: Option<(String, String)>) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .to(email.to.parse::<Mailbox>()?)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text_body,
                email.html_body,
            ))?;

        self.transport.send(message).await?;
        info!("Email sent: {}", email.subject);
        Ok(())
    }
}

/// Writes emails to the log instead of sending them. Used when no SMTP host is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        info!("{}", unsent_summary(&email));
        Ok(())
    }
}

// [security] Bodies carry live reset links - only the subject reaches the log
fn unsent_summary(email: &OutgoingEmail) -> String {
    format!(
        "Email not sent (no SMTP configured) - Subject: {} ({} bytes of text)",
        email.subject,
        email.text_body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_accepts_messages() {
        let email = OutgoingEmail {
            from: "no-reply@playfit.com".to_string(),
            to: "lea@example.com".to_string(),
            subject: "Hello".to_string(),
            text_body: "text".to_string(),
            html_body: "<p>html</p>".to_string(),
        };
        assert!(LogMailer.send(email).await.is_ok());
    }

    #[test]
    fn test_unsent_summary_hides_body() {
        let email = OutgoingEmail {
            from: "no-reply@playfit.com".to_string(),
            to: "lea@example.com".to_string(),
            subject: "Réinitialisation du mot de passe".to_string(),
            text_body: "http://localhost:8000/api/auth/reset_password?uid=MQ&token=abc-sig".to_string(),
            html_body: "<a href=\"http://localhost:8000/api/auth/reset_password?uid=MQ&token=abc-sig\">lien</a>".to_string(),
        };

        let summary = unsent_summary(&email);
        assert!(summary.contains("Réinitialisation du mot de passe"));
        assert!(!summary.contains("token="));
        assert!(!summary.contains("lea@example.com"));
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds() {
        assert!(SmtpMailer::new("smtp.example.com", 587, None).is_ok());
    }
}
