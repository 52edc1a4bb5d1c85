//! Outbound mail: verification codes, reset links and messages to the support inbox.

mod console;
mod smtp;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Checks that the transport is reachable. Called once at startup.
    async fn verify(&self) -> anyhow::Result<()>;

    async fn send_verification(&self, to: &str, otp: &str) -> anyhow::Result<()>;

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> anyhow::Result<()>;

    async fn send_contact(&self, name: &str, from: &str, message: &str) -> anyhow::Result<()>;

    async fn send_feedback(&self, from: &str, rating: u8, message: &str) -> anyhow::Result<()>;
}

/// A rendered message, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub html: String,
}

pub fn verification_mail(otp: &str) -> Mail {
    Mail {
        subject: "Email Verification".into(),
        html: format!(
            "<h1>Email Verification</h1>\
             <p>Your verification code is: <strong>{otp}</strong></p>\
             <p>This code will expire in 10 minutes.</p>"
        ),
    }
}

pub fn password_reset_mail(reset_link: &str) -> Mail {
    Mail {
        subject: "Password Reset Request".into(),
        html: format!(
            "<h1>Password Reset Request</h1>\
             <p>Click the link below to reset your password:</p>\
             <a href=\"{reset_link}\">Reset Password</a>\
             <p>This link will expire in 1 hour.</p>\
             <p>If you didn't request this, please ignore this email.</p>"
        ),
    }
}

pub fn contact_mail(name: &str, from: &str, message: &str) -> Mail {
    Mail {
        subject: format!("Contact Us Message from {name}"),
        html: format!(
            "<h2>New Contact Us Message</h2>\
             <p><strong>From:</strong> {}</p>\
             <p><strong>Email:</strong> {}</p>\
             <p><strong>Message:</strong></p>\
             <p>{}</p>",
            escape(name),
            escape(from),
            escape(message)
        ),
    }
}

pub fn feedback_mail(from: &str, rating: u8, message: &str) -> Mail {
    Mail {
        subject: format!("New User Feedback - {rating} Stars"),
        html: format!(
            "<h2>New User Feedback</h2>\
             <p><strong>From:</strong> {}</p>\
             <p><strong>Rating:</strong> {rating} Stars</p>\
             <p><strong>Feedback:</strong></p>\
             <p>{}</p>",
            escape(from),
            escape(message)
        ),
    }
}

// User-supplied text ends up in HTML bodies.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
