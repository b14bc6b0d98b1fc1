//! In-memory ledger store.
//!
//! A single async mutex around the whole state serializes every unit of
//! work, which gives the same guarantees as the row-locking database store.
//! Used by tests and by the HTTP adapter's test harness.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use banka_shared::{AccountId, Money, PageRequest, PageResponse, TransactionId, UserId};
use chrono::Utc;
use tokio::sync::Mutex;

use super::error::LedgerError;
use super::store::{LedgerStore, UserDirectory};
use super::types::{Account, LedgerTransaction, UserProfile};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<LedgerTransaction>,
    users: HashMap<UserId, UserProfile>,
    next_account_id: i64,
    next_transaction_id: i64,
    next_user_id: i64,
}

impl State {
    fn append(&mut self, from: Option<AccountId>, to: AccountId, amount: Money) -> LedgerTransaction {
        self.next_transaction_id += 1;
        let tx = LedgerTransaction {
            id: TransactionId(self.next_transaction_id),
            from_account_id: from,
            to_account_id: to,
            amount,
            created_at: Utc::now(),
        };
        self.transactions.push(tx.clone());
        tx
    }
}

fn overflow(account_id: AccountId) -> LedgerError {
    LedgerError::StorageUnavailable(format!("balance overflow on account {account_id}"))
}

/// Ledger store and user directory kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so handle lookups can find it.
    pub async fn register_user(&self, username: &str, email: &str) -> UserProfile {
        let mut state = self.state.lock().await;
        state.next_user_id += 1;
        let profile = UserProfile {
            id: UserId(state.next_user_id),
            username: username.to_string(),
            email: email.to_string(),
        };
        state.users.insert(profile.id, profile.clone());
        profile
    }

    /// Sum of every account balance.
    pub async fn total_balance(&self) -> Money {
        self.state.lock().await.accounts.values().map(|a| a.balance).sum()
    }

    /// Balance of an account regardless of owner.
    pub async fn balance_of(&self, account_id: AccountId) -> Option<Money> {
        self.state
            .lock()
            .await
            .accounts
            .get(&account_id)
            .map(|a| a.balance)
    }

    /// Full transaction log in commit order.
    pub async fn transactions(&self) -> Vec<LedgerTransaction> {
        self.state.lock().await.transactions.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_account(&self, user_id: UserId) -> Result<Account, LedgerError> {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let account = Account {
            id: AccountId(state.next_account_id),
            user_id,
            balance: Money::ZERO,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn top_up(
        &self,
        account_id: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .filter(|a| a.user_id == owner)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(account_id))?;
        Ok(state.append(None, account_id, amount))
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let mut state = self.state.lock().await;

        let source = state
            .accounts
            .get(&from)
            .filter(|a| a.user_id == owner)
            .ok_or(LedgerError::AccountNotFound(from))?;
        if source.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id: from,
                requested: amount,
                available: source.balance,
            });
        }
        let debited = source.balance - amount;

        // Validate the credit before touching either balance.
        let destination = state
            .accounts
            .get(&to)
            .ok_or(LedgerError::AccountNotFound(to))?;
        let credited = destination
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(to))?;

        if let Some(account) = state.accounts.get_mut(&from) {
            account.balance = debited;
        }
        if let Some(account) = state.accounts.get_mut(&to) {
            account.balance = credited;
        }
        Ok(state.append(Some(from), to, amount))
    }

    async fn first_account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError> {
        self.state
            .lock()
            .await
            .accounts
            .values()
            .find(|a| a.user_id == user_id)
            .cloned()
            .ok_or(LedgerError::DefaultAccountMissing(user_id))
    }

    async fn owner_of_account(&self, account_id: AccountId) -> Result<UserId, LedgerError> {
        self.state
            .lock()
            .await
            .accounts
            .get(&account_id)
            .map(|a| a.user_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn account(&self, account_id: AccountId, owner: UserId) -> Result<Account, LedgerError> {
        self.state
            .lock()
            .await
            .accounts
            .get(&account_id)
            .filter(|a| a.user_id == owner)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        owner: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerTransaction>, LedgerError> {
        let page = page.normalized();
        let state = self.state.lock().await;
        if !state
            .accounts
            .get(&account_id)
            .is_some_and(|a| a.user_id == owner)
        {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        let touching: Vec<&LedgerTransaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.to_account_id == account_id || tx.from_account_id == Some(account_id))
            .collect();
        let total = touching.len() as u64;
        let data = touching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(PageResponse::new(data, page, total))
    }
}

#[async_trait]
impl UserDirectory for InMemoryLedger {
    async fn user_id_by_username(&self, username: &str) -> Result<Option<UserId>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .map(|u| u.id))
    }

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserProfile>, LedgerError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }
}
