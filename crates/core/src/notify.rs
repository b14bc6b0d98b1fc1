//! Post-commit notifications.
//!
//! Delivery is best-effort. The engine never waits on a notifier and never
//! reports its failures to the caller.

use async_trait::async_trait;
use banka_shared::{AccountId, EmailService, Money};
use thiserror::Error;

/// Notification delivery failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers a message to a recipient address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message.
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl Notifier for EmailService {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.send_email(recipient, subject, body)
            .await
            .map_err(|e| NotifyError(e.to_string()))
    }
}

/// Message sent to the owner of a credited account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNotice {
    /// Debited account.
    pub from_account_id: AccountId,
    /// Credited account.
    pub to_account_id: AccountId,
    /// Amount moved.
    pub amount: Money,
}

impl TransferNotice {
    /// Subject line.
    pub const SUBJECT: &'static str = "You received a transfer";

    /// Plain-text body.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Your account {} received {} from account {}.",
            self.to_account_id, self.amount, self.from_account_id
        )
    }
}
