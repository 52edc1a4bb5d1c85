use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{contact_mail, feedback_mail, password_reset_mail, verification_mail, Mail, Mailer};
use crate::config::SmtpConfig;

/// SMTP mailer. The pooled transport is built once and shared across requests.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    inbox: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig, inbox: &str) -> anyhow::Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("build smtp transport")?
            .port(cfg.port)
            .credentials(creds)
            .build();

        let from = match &cfg.from_name {
            Some(name) => format!("{} <{}>", name, cfg.from_email),
            None => format!("OptiGuard <{}>", cfg.from_email),
        };

        Ok(Self {
            transport,
            from: from.parse().context("parse from address")?,
            inbox: inbox.parse().context("parse contact inbox address")?,
        })
    }

    async fn send(&self, to: Mailbox, reply_to: Option<&str>, mail: Mail) -> anyhow::Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML);
        if let Some(addr) = reply_to {
            builder = builder.reply_to(addr.parse().context("parse reply-to address")?);
        }
        let message = builder.body(mail.html).context("build email")?;

        self.transport
            .send(message)
            .await
            .context("smtp send")?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn verify(&self) -> anyhow::Result<()> {
        let ok = self
            .transport
            .test_connection()
            .await
            .context("smtp connection test")?;
        anyhow::ensure!(ok, "smtp server refused connection test");
        tracing::info!("email service is ready");
        Ok(())
    }

    async fn send_verification(&self, to: &str, otp: &str) -> anyhow::Result<()> {
        let to = to.parse().context("parse recipient")?;
        self.send(to, None, verification_mail(otp)).await?;
        tracing::info!("verification email sent");
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        let to = to.parse().context("parse recipient")?;
        self.send(to, None, password_reset_mail(reset_link)).await?;
        tracing::info!("password reset email sent");
        Ok(())
    }

    async fn send_contact(&self, name: &str, from: &str, message: &str) -> anyhow::Result<()> {
        self.send(self.inbox.clone(), Some(from), contact_mail(name, from, message))
            .await
    }

    async fn send_feedback(&self, from: &str, rating: u8, message: &str) -> anyhow::Result<()> {
        self.send(self.inbox.clone(), Some(from), feedback_mail(from, rating, message))
            .await
    }
}
