//! Account repository: the database-backed ledger store.
//!
//! Every mutating operation runs inside one database transaction. All reads
//! and writes inside that unit go through the open transaction, never the
//! pool, so a pool of one connection cannot deadlock on itself.

use async_trait::async_trait;
use banka_core::{Account, LedgerError, LedgerStore, LedgerTransaction};
use banka_shared::{AccountId, Money, PageRequest, PageResponse, TransactionId, UserId};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::entities::{accounts, transactions};

/// Maps a database failure onto the ledger's storage error.
pub(crate) fn storage(err: DbErr) -> LedgerError {
    LedgerError::StorageUnavailable(err.to_string())
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: AccountId(model.id),
            user_id: UserId(model.user_id),
            balance: Money::from_minor(model.balance),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<transactions::Model> for LedgerTransaction {
    fn from(model: transactions::Model) -> Self {
        Self {
            id: TransactionId(model.id),
            from_account_id: model.from_account_id.map(AccountId),
            to_account_id: AccountId(model.to_account_id),
            amount: Money::from_minor(model.amount),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// `SeaORM` implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends one ledger row inside an open transaction.
    async fn append(
        txn: &DatabaseTransaction,
        from: Option<AccountId>,
        to: AccountId,
        amount: Money,
    ) -> Result<transactions::Model, DbErr> {
        transactions::ActiveModel {
            from_account_id: Set(from.map(AccountId::into_inner)),
            to_account_id: Set(to.into_inner()),
            amount: Set(amount.minor()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(txn)
        .await
    }

    /// Locks both rows of a transfer in ascending id order.
    ///
    /// On PostgreSQL this is `SELECT ... FOR UPDATE`; SQLite has no row locks
    /// and serializes writers on the database instead.
    async fn lock_pair(
        txn: &DatabaseTransaction,
        from: AccountId,
        to: AccountId,
    ) -> Result<Vec<accounts::Model>, DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::Id.is_in([from.into_inner(), to.into_inner()]))
            .order_by_asc(accounts::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await
    }

    async fn transfer_in(
        txn: &DatabaseTransaction,
        from: AccountId,
        to: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<transactions::Model, LedgerError> {
        // The debit and credit below would touch one row twice.
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let locked = Self::lock_pair(txn, from, to).await.map_err(storage)?;

        let source = locked
            .iter()
            .find(|a| a.id == from.into_inner() && a.user_id == owner.into_inner())
            .ok_or(LedgerError::AccountNotFound(from))?;
        if !locked.iter().any(|a| a.id == to.into_inner()) {
            return Err(LedgerError::AccountNotFound(to));
        }

        let available = Money::from_minor(source.balance);
        let insufficient = LedgerError::InsufficientFunds {
            account_id: from,
            requested: amount,
            available,
        };
        if available < amount {
            return Err(insufficient);
        }

        // Guarded debit: the balance condition holds even without row locks.
        let debit = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).sub(amount.minor()),
            )
            .filter(accounts::Column::Id.eq(from.into_inner()))
            .filter(accounts::Column::Balance.gte(amount.minor()))
            .exec(txn)
            .await
            .map_err(storage)?;
        if debit.rows_affected == 0 {
            return Err(insufficient);
        }

        let credit = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(amount.minor()),
            )
            .filter(accounts::Column::Id.eq(to.into_inner()))
            .exec(txn)
            .await
            .map_err(storage)?;
        if credit.rows_affected == 0 {
            return Err(LedgerError::AccountNotFound(to));
        }

        Self::append(txn, Some(from), to, amount)
            .await
            .map_err(storage)
    }

    async fn top_up_in(
        txn: &DatabaseTransaction,
        account_id: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<transactions::Model, LedgerError> {
        // Ownership is decided by the affected-row count, not a prior read.
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(amount.minor()),
            )
            .filter(accounts::Column::Id.eq(account_id.into_inner()))
            .filter(accounts::Column::UserId.eq(owner.into_inner()))
            .exec(txn)
            .await
            .map_err(storage)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        Self::append(txn, None, account_id, amount)
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl LedgerStore for AccountRepository {
    async fn create_account(&self, user_id: UserId) -> Result<Account, LedgerError> {
        let model = accounts::ActiveModel {
            user_id: Set(user_id.into_inner()),
            balance: Set(0),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(storage)?;

        Ok(model.into())
    }

    async fn top_up(
        &self,
        account_id: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        let txn = self.db.begin().await.map_err(storage)?;
        // Any early return drops `txn`, which rolls it back.
        let row = Self::top_up_in(&txn, account_id, owner, amount).await?;
        txn.commit().await.map_err(storage)?;

        debug!(account_id = %account_id, transaction_id = row.id, "Top-up committed");
        Ok(row.into())
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        owner: UserId,
        amount: Money,
    ) -> Result<LedgerTransaction, LedgerError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let row = Self::transfer_in(&txn, from, to, owner, amount).await?;
        txn.commit().await.map_err(storage)?;

        debug!(
            from_account_id = %from,
            to_account_id = %to,
            transaction_id = row.id,
            "Transfer committed"
        );
        Ok(row.into())
    }

    async fn first_account_by_user(&self, user_id: UserId) -> Result<Account, LedgerError> {
        accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.into_inner()))
            .order_by_asc(accounts::Column::Id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Account::from)
            .ok_or(LedgerError::DefaultAccountMissing(user_id))
    }

    async fn owner_of_account(&self, account_id: AccountId) -> Result<UserId, LedgerError> {
        accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(|a| UserId(a.user_id))
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn account(&self, account_id: AccountId, owner: UserId) -> Result<Account, LedgerError> {
        accounts::Entity::find_by_id(account_id.into_inner())
            .filter(accounts::Column::UserId.eq(owner.into_inner()))
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Account::from)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.into_inner()))
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?;

        Ok(models.into_iter().map(Account::from).collect())
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
        owner: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerTransaction>, LedgerError> {
        let page = page.normalized();
        self.account(account_id, owner).await?;

        let touching = Condition::any()
            .add(transactions::Column::FromAccountId.eq(account_id.into_inner()))
            .add(transactions::Column::ToAccountId.eq(account_id.into_inner()));

        let total = transactions::Entity::find()
            .filter(touching.clone())
            .count(&self.db)
            .await
            .map_err(storage)?;

        let rows = transactions::Entity::find()
            .filter(touching)
            .order_by_desc(transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(storage)?;

        Ok(PageResponse::new(
            rows.into_iter().map(LedgerTransaction::from).collect(),
            page,
            total,
        ))
    }
}
