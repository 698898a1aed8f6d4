//! Outgoing account notifications.
//!
//! Workflows hand a [`Notification`] to a [`NotificationSink`]; `submit` returns as soon
//! as the payload is queued. A worker task drains the queue and passes rendered emails
//! to a [`Mailer`].

mod mailer;
mod queue;

use serde::Serialize;
use thiserror::Error;

pub use mailer::{LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use queue::{spawn_delivery_worker, QueueSink};

/// Fields every account email needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailDetails {
    pub name: String,
    pub email: String,
    pub encrypted_email: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    VerifyAccount(MailDetails),
    PasswordReset(MailDetails),
}

impl Notification {
    pub fn details(&self) -> &MailDetails {
        match self {
            Notification::VerifyAccount(d) | Notification::PasswordReset(d) => d,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::VerifyAccount(_) => "verify_account",
            Notification::PasswordReset(_) => "password_reset",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("notification queue is full")]
    Full,
    #[error("notification queue is closed")]
    Closed,
}

/// Accepts notifications for asynchronous delivery.
pub trait NotificationSink: Send + Sync {
    fn submit(&self, notification: Notification) -> Result<(), SinkError>;
}
