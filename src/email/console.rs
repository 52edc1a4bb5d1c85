use async_trait::async_trait;

use super::{contact_mail, feedback_mail, password_reset_mail, verification_mail, Mail, Mailer};

/// Logs mail instead of sending it. Used when SMTP is not configured.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer {
    inbox: String,
}

impl ConsoleMailer {
    pub fn new(inbox: impl Into<String>) -> Self {
        Self {
            inbox: inbox.into(),
        }
    }

    fn deliver(&self, to: &str, mail: Mail) {
        tracing::info!(%to, subject = %mail.subject, body = %mail.html, "console mail");
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn verify(&self) -> anyhow::Result<()> {
        tracing::warn!("SMTP not configured; mail is written to the log");
        Ok(())
    }

    async fn send_verification(&self, to: &str, otp: &str) -> anyhow::Result<()> {
        self.deliver(to, verification_mail(otp));
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        self.deliver(to, password_reset_mail(reset_link));
        Ok(())
    }

    async fn send_contact(&self, name: &str, from: &str, message: &str) -> anyhow::Result<()> {
        self.deliver(&self.inbox, contact_mail(name, from, message));
        Ok(())
    }

    async fn send_feedback(&self, from: &str, rating: u8, message: &str) -> anyhow::Result<()> {
        self.deliver(&self.inbox, feedback_mail(from, rating, message));
        Ok(())
    }
}
