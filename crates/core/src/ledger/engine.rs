//! Transfer engine.
//!
//! Validates and normalizes requests, resolves handles through the
//! [`AccountDirectory`], then delegates the atomic work to the
//! [`LedgerStore`]. The engine never touches a balance itself.
//!
//! Each request moves through [`TransferState`]:
//! `Validated -> Resolved -> Committed | Aborted`. Transitions are emitted as
//! `state` fields on log events.

use std::future::Future;
use std::sync::Arc;

use banka_shared::{AccountId, LedgerConfig, Money, PageRequest, PageResponse, UserId};
use tracing::{debug, error, info, warn};

use super::directory::AccountDirectory;
use super::error::LedgerError;
use super::store::{LedgerStore, UserDirectory};
use super::types::{Account, Caller, LedgerTransaction, TransferState};
use crate::notify::{Notifier, TransferNotice};

/// Orchestrates account creation, top-ups and transfers.
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    directory: AccountDirectory,
    notifier: Option<Arc<dyn Notifier>>,
    config: LedgerConfig,
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("notifier", &self.notifier.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn validate_amount(amount: Money) -> Result<(), LedgerError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

impl TransferEngine {
    /// Creates an engine without a notifier.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        users: Arc<dyn UserDirectory>,
        config: LedgerConfig,
    ) -> Self {
        let directory = AccountDirectory::new(Arc::clone(&store), users);
        Self {
            store,
            directory,
            notifier: None,
            config,
        }
    }

    /// Attaches a post-commit notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The directory used for handle resolution.
    #[must_use]
    pub const fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// Runs a store call under the operation timeout.
    ///
    /// A timed-out future is dropped, which rolls back any open unit of work.
    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        let limit = self.config.operation_timeout();
        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::StorageUnavailable(format!(
                "{operation} timed out after {} ms",
                limit.as_millis()
            ))),
        };
        if let Err(LedgerError::StorageUnavailable(reason)) = &result {
            error!(operation, error = %reason, "Ledger store unavailable");
        }
        result
    }

    /// Creates a zero-balance account for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails.
    pub async fn create_account(&self, user_id: UserId) -> Result<Account, LedgerError> {
        let account = self
            .guarded("create_account", self.store.create_account(user_id))
            .await?;
        info!(user_id = %user_id, account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Credits an owned account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive amount and `AccountNotFound`
    /// if the account is missing or not owned by `user_id`.
    pub async fn top_up(
        &self,
        user_id: UserId,
        account_id: AccountId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        validate_amount(amount)?;
        let tx = self
            .guarded("top_up", self.store.top_up(account_id, user_id, amount))
            .await?;
        info!(
            user_id = %user_id,
            account_id = %account_id,
            amount = %amount,
            transaction_id = %tx.id,
            "Account topped up"
        );
        Ok(tx)
    }

    /// Moves funds between two accounts; the source must belong to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` or `SelfTransfer` before touching the store,
    /// then whatever the store's transfer reports.
    pub async fn transfer_by_accounts(
        &self,
        user_id: UserId,
        from: AccountId,
        to: AccountId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        validate_amount(amount)?;
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        debug!(
            state = TransferState::Validated.as_str(),
            from_account_id = %from,
            to_account_id = %to,
            amount = %amount
        );
        self.commit(user_id, from, to, amount).await
    }

    /// Pays a user's default account from one of the caller's accounts.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` or `DefaultAccountMissing` if the handle cannot
    /// be resolved, and `SelfTransfer` if it resolves to the source account.
    pub async fn transfer_to_handle(
        &self,
        user_id: UserId,
        from: AccountId,
        to_handle: &str,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        validate_amount(amount)?;
        debug!(state = TransferState::Validated.as_str(), from_account_id = %from, to_handle);

        let to_user = self
            .guarded("resolve_username", self.directory.resolve_username(to_handle))
            .await?;
        let to = self
            .guarded("default_account_for", self.directory.default_account_for(to_user))
            .await?;
        if to == from {
            return Err(LedgerError::SelfTransfer);
        }
        self.commit(user_id, from, to, amount).await
    }

    /// Moves funds between the default accounts of two users named by handle.
    ///
    /// A [`Caller::User`] must be the source user. [`Caller::Trusted`] skips
    /// that check and is meant for in-process callers only.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount`, `SelfTransfer`, `UserNotFound`,
    /// `DefaultAccountMissing`, `Forbidden`, or any transfer error.
    pub async fn transfer_by_handles(
        &self,
        caller: Caller,
        from_handle: &str,
        to_handle: &str,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        validate_amount(amount)?;
        if from_handle == to_handle {
            return Err(LedgerError::SelfTransfer);
        }
        debug!(state = TransferState::Validated.as_str(), from_handle, to_handle);

        let from_user = self
            .guarded("resolve_username", self.directory.resolve_username(from_handle))
            .await?;
        if let Caller::User(caller_id) = caller
            && caller_id != from_user
        {
            warn!(
                caller_id = %caller_id,
                from_handle,
                state = TransferState::Aborted.as_str(),
                "Caller is not the source of a handle transfer"
            );
            return Err(LedgerError::Forbidden(format!(
                "cannot transfer on behalf of {from_handle}"
            )));
        }
        let to_user = self
            .guarded("resolve_username", self.directory.resolve_username(to_handle))
            .await?;

        let from = self
            .guarded("default_account_for", self.directory.default_account_for(from_user))
            .await?;
        let to = self
            .guarded("default_account_for", self.directory.default_account_for(to_user))
            .await?;

        self.transfer_by_accounts(from_user, from, to, amount).await
    }

    /// Accounts owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails.
    pub async fn accounts(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        self.guarded("accounts_for_user", self.store.accounts_for_user(user_id))
            .await
    }

    /// One owned account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is missing or not owned.
    pub async fn account(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.guarded("account", self.store.account(account_id, user_id))
            .await
    }

    /// Paged ledger entries of an owned account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is missing or not owned.
    pub async fn statement(
        &self,
        user_id: UserId,
        account_id: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerTransaction>, LedgerError> {
        self.guarded(
            "transactions_for_account",
            self.store
                .transactions_for_account(account_id, user_id, page.normalized()),
        )
        .await
    }

    async fn commit(
        &self,
        owner: UserId,
        from: AccountId,
        to: AccountId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        debug!(
            state = TransferState::Resolved.as_str(),
            from_account_id = %from,
            to_account_id = %to
        );

        match self
            .guarded("transfer", self.store.transfer(from, to, owner, amount))
            .await
        {
            Ok(tx) => {
                info!(
                    state = TransferState::Committed.as_str(),
                    transaction_id = %tx.id,
                    from_account_id = %from,
                    to_account_id = %to,
                    amount = %amount,
                    "Transfer committed"
                );
                self.dispatch_notice(TransferNotice {
                    from_account_id: from,
                    to_account_id: to,
                    amount,
                });
                Ok(tx)
            }
            Err(e) => {
                info!(
                    state = TransferState::Aborted.as_str(),
                    from_account_id = %from,
                    to_account_id = %to,
                    amount = %amount,
                    error_code = e.error_code(),
                    "Transfer aborted"
                );
                Err(e)
            }
        }
    }

    /// Fires the notification in a detached task after commit.
    fn dispatch_notice(&self, notice: TransferNotice) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let directory = self.directory.clone();

        tokio::spawn(async move {
            let recipient = match directory.contact_for_account(notice.to_account_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(
                        account_id = %notice.to_account_id,
                        error = %e,
                        "Could not resolve transfer recipient"
                    );
                    return;
                }
            };
            if let Err(e) = notifier
                .notify(&recipient.email, TransferNotice::SUBJECT, &notice.body())
                .await
            {
                warn!(user_id = %recipient.id, error = %e, "Transfer notification failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use rstest::rstest;
    use tokio::sync::mpsc;

    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::ledger::store::{MockLedgerStore, MockUserDirectory};
    use crate::notify::{MockNotifier, NotifyError};

    fn money(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    fn engine_over(ledger: &Arc<InMemoryLedger>) -> TransferEngine {
        TransferEngine::new(ledger.clone(), ledger.clone(), LedgerConfig::default())
    }

    /// alice owns account 1 with `balance`, bob owns account 2 with zero.
    async fn two_users(balance: i64) -> (Arc<InMemoryLedger>, TransferEngine, Account, Account) {
        let ledger = Arc::new(InMemoryLedger::new());
        let alice = ledger.register_user("alice", "alice@example.com").await;
        let bob = ledger.register_user("bob", "bob@example.com").await;
        let engine = engine_over(&ledger);
        let a = engine.create_account(alice.id).await.unwrap();
        let b = engine.create_account(bob.id).await.unwrap();
        if balance > 0 {
            engine.top_up(alice.id, a.id, money(balance)).await.unwrap();
        }
        (ledger, engine, a, b)
    }

    fn mock_engine() -> TransferEngine {
        TransferEngine::new(
            Arc::new(MockLedgerStore::new()),
            Arc::new(MockUserDirectory::new()),
            LedgerConfig::default(),
        )
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(-10_000)]
    #[tokio::test]
    async fn test_non_positive_amounts_rejected_before_store(#[case] minor: i64) {
        // Mocks without expectations panic on any call.
        let engine = mock_engine();
        let amount = money(minor);

        assert_eq!(
            engine.top_up(UserId(1), AccountId(1), amount).await,
            Err(LedgerError::InvalidAmount(amount))
        );
        assert_eq!(
            engine
                .transfer_by_accounts(UserId(1), AccountId(1), AccountId(2), amount)
                .await,
            Err(LedgerError::InvalidAmount(amount))
        );
        assert_eq!(
            engine
                .transfer_by_handles(Caller::Trusted, "alice", "bob", amount)
                .await,
            Err(LedgerError::InvalidAmount(amount))
        );
    }

    #[rstest]
    #[case(1)]
    #[case(1_000_000)]
    #[tokio::test]
    async fn test_self_transfer_always_rejected(#[case] minor: i64) {
        let engine = mock_engine();
        assert_eq!(
            engine
                .transfer_by_accounts(UserId(1), AccountId(3), AccountId(3), money(minor))
                .await,
            Err(LedgerError::SelfTransfer)
        );
        assert_eq!(
            engine
                .transfer_by_handles(Caller::Trusted, "alice", "alice", money(minor))
                .await,
            Err(LedgerError::SelfTransfer)
        );
    }

    #[tokio::test]
    async fn test_top_up_scenario() {
        let (ledger, engine, a, _) = two_users(10_000).await;
        let tx = engine
            .top_up(a.user_id, a.id, money(5_000))
            .await
            .unwrap();

        assert_eq!(tx.from_account_id, None);
        assert_eq!(ledger.balance_of(a.id).await, Some(money(15_000)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_scenario() {
        let (ledger, engine, a, b) = two_users(15_000).await;
        let before = ledger.transactions().await.len();

        let err = engine
            .transfer_by_accounts(a.user_id, a.id, b.id, money(20_000))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account_id: a.id,
                requested: money(20_000),
                available: money(15_000),
            }
        );
        assert_eq!(ledger.balance_of(a.id).await, Some(money(15_000)));
        assert_eq!(ledger.balance_of(b.id).await, Some(Money::ZERO));
        assert_eq!(ledger.transactions().await.len(), before);
    }

    #[tokio::test]
    async fn test_handle_transfer_scenario() {
        let (ledger, engine, a, b) = two_users(15_000).await;

        let tx = engine
            .transfer_by_handles(Caller::User(a.user_id), "alice", "bob", money(10_000))
            .await
            .unwrap();

        assert_eq!(tx.from_account_id, Some(a.id));
        assert_eq!(tx.to_account_id, b.id);
        assert_eq!(tx.amount, money(10_000));
        assert_eq!(ledger.balance_of(a.id).await, Some(money(5_000)));
        assert_eq!(ledger.balance_of(b.id).await, Some(money(10_000)));
    }

    #[tokio::test]
    async fn test_handle_transfer_requires_source_caller() {
        let (ledger, engine, a, b) = two_users(15_000).await;

        let err = engine
            .transfer_by_handles(Caller::User(b.user_id), "alice", "bob", money(100))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Forbidden(_)));
        assert_eq!(ledger.balance_of(a.id).await, Some(money(15_000)));

        // On-behalf mode for trusted callers.
        engine
            .transfer_by_handles(Caller::Trusted, "alice", "bob", money(100))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(b.id).await, Some(money(100)));
    }

    #[tokio::test]
    async fn test_handle_resolution_errors() {
        let (ledger, engine, a, _) = two_users(1_000).await;
        ledger.register_user("carol", "carol@example.com").await;

        assert_eq!(
            engine
                .transfer_by_handles(Caller::Trusted, "alice", "ghost", money(1))
                .await,
            Err(LedgerError::UserNotFound("ghost".into()))
        );
        assert!(matches!(
            engine
                .transfer_to_handle(a.user_id, a.id, "carol", money(1))
                .await,
            Err(LedgerError::DefaultAccountMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_to_own_handle_is_self_transfer() {
        let (_, engine, a, b) = two_users(1_000).await;

        assert_eq!(
            engine
                .transfer_to_handle(a.user_id, a.id, "alice", money(1))
                .await,
            Err(LedgerError::SelfTransfer)
        );
        let tx = engine
            .transfer_to_handle(a.user_id, a.id, "bob", money(1))
            .await
            .unwrap();
        assert_eq!(tx.to_account_id, b.id);
    }

    #[tokio::test]
    async fn test_source_must_be_owned() {
        let (_, engine, a, b) = two_users(1_000).await;
        assert_eq!(
            engine
                .transfer_by_accounts(b.user_id, a.id, b.id, money(1))
                .await,
            Err(LedgerError::AccountNotFound(a.id))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_never_overdraw() {
        let (ledger, engine, a, b) = two_users(1_000).await;
        let engine = Arc::new(engine);
        let (owner, from, to) = (a.user_id, a.id, b.id);

        let handles = (0..10).map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .transfer_by_accounts(owner, from, to, money(300))
                    .await
            })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 3);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, LedgerError::InsufficientFunds { .. }))
        );
        assert_eq!(ledger.balance_of(a.id).await, Some(money(100)));
        assert_eq!(ledger.balance_of(b.id).await, Some(money(900)));
        assert_eq!(ledger.total_balance().await, money(1_000));
    }

    #[tokio::test]
    async fn test_notifier_receives_notice_for_recipient() {
        let (_, engine, a, b) = two_users(1_000).await;
        let (sender, mut receiver) = mpsc::channel(1);

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(move |to, subject, body| {
            sender
                .try_send((to.to_string(), subject.to_string(), body.to_string()))
                .unwrap();
            Ok(())
        });
        let engine = engine.with_notifier(Arc::new(notifier));

        engine
            .transfer_by_accounts(a.user_id, a.id, b.id, money(250))
            .await
            .unwrap();

        let (to, subject, body) = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(to, "bob@example.com");
        assert_eq!(subject, TransferNotice::SUBJECT);
        assert!(body.contains("2.50"));
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_fail_transfer() {
        let (ledger, engine, a, b) = two_users(1_000).await;
        let (sender, mut receiver) = mpsc::channel(1);

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(move |_, _, _| {
            sender.try_send(()).unwrap();
            Err(NotifyError("smtp down".into()))
        });
        let engine = engine.with_notifier(Arc::new(notifier));

        let tx = engine
            .transfer_by_accounts(a.user_id, a.id, b.id, money(400))
            .await;

        assert!(tx.is_ok());
        tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.balance_of(a.id).await, Some(money(600)));
        assert_eq!(ledger.balance_of(b.id).await, Some(money(400)));
        assert_eq!(ledger.transactions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_storage_error_passes_through() {
        let mut store = MockLedgerStore::new();
        store
            .expect_create_account()
            .returning(|_| Err(LedgerError::StorageUnavailable("connection reset".into())));
        let engine = TransferEngine::new(
            Arc::new(store),
            Arc::new(MockUserDirectory::new()),
            LedgerConfig::default(),
        );

        let err = engine.create_account(UserId(1)).await.unwrap_err();
        assert_eq!(err.http_status_code(), 503);
    }

    /// Store whose transfers stall before reaching the wrapped ledger.
    struct SlowStore {
        inner: Arc<InMemoryLedger>,
        delay: Duration,
    }

    #[async_trait]
    impl LedgerStore for SlowStore {
        async fn create_account(&self, user_id: UserId) -> Result<Account, LedgerError> {
            self.inner.create_account(user_id).await
        }

        async fn top_up(
            &self,
            account_id: AccountId,
            owner: UserId,
            amount: Money,
        ) -> Result<LedgerTransaction, LedgerError> {
            self.inner.top_up(account_id, owner, amount).await
        }

        async fn transfer(
            &self,
            from: AccountId,
            to: AccountId,
            owner: UserId,
            amount: Money,
        ) -> Result<LedgerTransaction, LedgerError> {
            tokio::time::sleep(self.delay).await;
            self.inner.transfer(from, to, owner, amount).await
        }

        async fn first_account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError> {
            self.inner.first_account_by_user(user_id).await
        }

        async fn owner_of_account(&self, account_id: AccountId) -> Result<UserId, LedgerError> {
            self.inner.owner_of_account(account_id).await
        }

        async fn account(
            &self,
            account_id: AccountId,
            owner: UserId,
        ) -> Result<Account, LedgerError> {
            self.inner.account(account_id, owner).await
        }

        async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
            self.inner.accounts_for_user(user_id).await
        }

        async fn transactions_for_account(
            &self,
            account_id: AccountId,
            owner: UserId,
            page: PageRequest,
        ) -> Result<PageResponse<LedgerTransaction>, LedgerError> {
            self.inner
                .transactions_for_account(account_id, owner, page)
                .await
        }
    }

    #[tokio::test]
    async fn test_timeout_aborts_cleanly() {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(SlowStore {
            inner: Arc::clone(&ledger),
            delay: Duration::from_millis(500),
        });
        let engine = TransferEngine::new(
            store,
            ledger.clone(),
            LedgerConfig {
                operation_timeout_ms: 20,
            },
        );
        let a = engine.create_account(UserId(1)).await.unwrap();
        let b = engine.create_account(UserId(2)).await.unwrap();
        engine.top_up(UserId(1), a.id, money(1_000)).await.unwrap();

        let err = engine
            .transfer_by_accounts(UserId(1), a.id, b.id, money(100))
            .await
            .unwrap_err();

        assert!(err.is_storage());
        assert_eq!(ledger.balance_of(a.id).await, Some(money(1_000)));
        assert_eq!(ledger.balance_of(b.id).await, Some(Money::ZERO));
        assert_eq!(ledger.transactions().await.len(), 1);
    }
}
