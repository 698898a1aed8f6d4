use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::Notification;
use crate::config::{LinkConfig, SmtpConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn render(notification: &Notification, links: &LinkConfig) -> Self {
        let d = notification.details();
        match notification {
            Notification::VerifyAccount(_) => {
                let link = format!(
                    "{}/auth/verify/{}/{}",
                    links.app_url.trim_end_matches('/'),
                    d.token,
                    d.encrypted_email
                );
                Self {
                    to: d.email.clone(),
                    subject: "Verify your email address".into(),
                    body: format!(
                        "Hello {},\n\nPlease confirm your email address by opening the link below:\n\n{}\n\nIf you did not create an account, no further action is required.\n",
                        d.name, link
                    ),
                }
            }
            Notification::PasswordReset(_) => {
                let link = format!(
                    "{}/reset-password?token={}&email={}",
                    links.frontend_url.trim_end_matches('/'),
                    d.token,
                    d.encrypted_email
                );
                Self {
                    to: d.email.clone(),
                    subject: "Reset your password".into(),
                    body: format!(
                        "Hello {},\n\nWe received a request to reset your password. Use the link below to choose a new one:\n\n{}\n\nIf you did not request a password reset, you can ignore this email.\n",
                        d.name, link
                    ),
                }
            }
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("smtp relay")?
            .port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.user, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: cfg.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(email.to.parse().context("parse recipient address")?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// Used when no SMTP server is configured; writes the email to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.body, "email (log mailer)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MailDetails;
    use crate::testing::test_links;

    fn details() -> MailDetails {
        MailDetails {
            name: "Alice".into(),
            email: "alice@x.com".into(),
            encrypted_email: "ENCRYPTED".into(),
            token: "abc".into(),
        }
    }

    #[test]
    fn verify_email_links_to_the_api() {
        let mail = OutgoingEmail::render(&Notification::VerifyAccount(details()), &test_links());
        assert_eq!(mail.to, "alice@x.com");
        assert!(mail.body.contains("http://api.test/auth/verify/abc/ENCRYPTED"));
        assert!(mail.body.contains("Hello Alice"));
    }

    #[test]
    fn reset_email_links_to_the_frontend() {
        let mail = OutgoingEmail::render(&Notification::PasswordReset(details()), &test_links());
        assert!(mail
            .body
            .contains("http://app.test/reset-password?token=abc&email=ENCRYPTED"));
        assert_eq!(mail.subject, "Reset your password");
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        let mail = OutgoingEmail::render(&Notification::VerifyAccount(details()), &test_links());
        assert!(LogMailer.send(&mail).await.is_ok());
    }
}
