//! Ledger domain types.

use banka_shared::{AccountId, Money, TransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A balance-bearing account owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier.
    pub id: AccountId,
    /// Owning user, fixed at creation.
    pub user_id: UserId,
    /// Current balance, never negative outside a unit of work.
    pub balance: Money,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Kind of movement recorded by a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// External funds credited to an account.
    TopUp,
    /// Funds moved between two accounts.
    Transfer,
}

/// Immutable ledger entry for one committed fund movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Store-assigned, monotonically increasing identifier.
    pub id: TransactionId,
    /// Source account, `None` for top-ups.
    pub from_account_id: Option<AccountId>,
    /// Destination account.
    pub to_account_id: AccountId,
    /// Strictly positive amount.
    pub amount: Money,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Returns the kind of movement this entry records.
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        if self.from_account_id.is_some() {
            TransactionKind::Transfer
        } else {
            TransactionKind::TopUp
        }
    }

    /// Signed effect of this entry on the given account's balance.
    #[must_use]
    pub fn net_effect_on(&self, account_id: AccountId) -> Money {
        let mut effect = Money::ZERO;
        if self.to_account_id == account_id {
            effect = effect + self.amount;
        }
        if self.from_account_id == Some(account_id) {
            effect = effect - self.amount;
        }
        effect
    }
}

/// The parts of a user the ledger cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Unique handle.
    pub username: String,
    /// Notification address.
    pub email: String,
}

/// Who is asking for a handle-based transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// An authenticated user; must be the source identity.
    User(UserId),
    /// A trusted in-process caller acting on behalf of the source.
    Trusted,
}

/// Lifecycle of a single transfer request.
///
/// `Aborted` and `Committed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Amount and endpoints passed validation.
    Validated,
    /// Handles resolved to concrete accounts.
    Resolved,
    /// Balances moved and the ledger row appended.
    Committed,
    /// Nothing changed.
    Aborted,
}

impl TransferState {
    /// Log-friendly name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Resolved => "resolved",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}
