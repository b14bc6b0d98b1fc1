//! Persistence seams for the ledger.
//!
//! The database crate implements both traits; [`super::InMemoryLedger`]
//! implements them for tests and local runs.

use async_trait::async_trait;
use banka_shared::{AccountId, Money, PageRequest, PageResponse, UserId};

use super::error::LedgerError;
use super::types::{Account, LedgerTransaction, UserProfile};

/// Durable, atomic account and transaction storage.
///
/// Every mutating method is one all-or-nothing unit of work: on error no
/// balance change or transaction row survives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates an account with a zero balance.
    async fn create_account(&self, user_id: UserId) -> Result<Account, LedgerError>;

    /// Credits `amount` to an account owned by `owner`.
    ///
    /// Ownership is checked by the affected-row count of the update itself.
    /// Returns `AccountNotFound` when the account is missing or owned by
    /// someone else.
    async fn top_up(
        &self,
        account_id: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError>;

    /// Moves `amount` from an account owned by `owner` to any existing account.
    ///
    /// `from == to` is rejected with `SelfTransfer`.
    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError>;

    /// Lowest-id account of a user, or `DefaultAccountMissing`.
    async fn first_account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError>;

    /// Owner of an account, or `AccountNotFound`.
    async fn owner_of_account(&self, account_id: AccountId) -> Result<UserId, LedgerError>;

    /// Owner-scoped account lookup.
    async fn account(&self, account_id: AccountId, owner: UserId) -> Result<Account, LedgerError>;

    /// All accounts of a user, ordered by id.
    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError>;

    /// Ledger entries touching an owned account, newest first.
    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        owner: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerTransaction>, LedgerError>;
}

/// Read-only view of the identity subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user id by handle.
    async fn user_id_by_username(&self, username: &str) -> Result<Option<UserId>, LedgerError>;

    /// Looks up a user by id.
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserProfile>, LedgerError>;
}
