//! Shared setup for database integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use banka_core::{Account, LedgerStore, TransferEngine};
use banka_db::migration::{Migrator, MigratorTrait};
use banka_db::{AccountRepository, UserRepository};
use banka_shared::{DatabaseConfig, LedgerConfig, Money, UserId};
use sea_orm::DatabaseConnection;

/// Fresh in-memory SQLite database with all migrations applied.
///
/// One pooled connection: every connection to `sqlite::memory:` opens its
/// own empty database.
pub async fn sqlite() -> DatabaseConnection {
    let config = DatabaseConfig {
        max_connections: 1,
        min_connections: 1,
        ..DatabaseConfig::with_url("sqlite::memory:")
    };
    let db = banka_db::connect(&config).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub accounts: Arc<AccountRepository>,
    pub users: Arc<UserRepository>,
    pub engine: TransferEngine,
}

pub fn harness_on(db: DatabaseConnection) -> Harness {
    let accounts = Arc::new(AccountRepository::new(db.clone()));
    let users = Arc::new(UserRepository::new(db.clone()));
    let engine = TransferEngine::new(accounts.clone(), users.clone(), LedgerConfig::default());
    Harness {
        db,
        accounts,
        users,
        engine,
    }
}

pub async fn harness() -> Harness {
    harness_on(sqlite().await)
}

impl Harness {
    /// Creates a user with one account holding `balance` minor units.
    pub async fn funded_user(&self, username: &str, balance: i64) -> Account {
        let user = self
            .users
            .create(username, &format!("{username}@example.com"))
            .await
            .unwrap();
        let account = self.accounts.create_account(UserId(user.id)).await.unwrap();
        if balance > 0 {
            self.accounts
                .top_up(account.id, account.user_id, Money::from_minor(balance))
                .await
                .unwrap();
        }
        self.accounts
            .account(account.id, account.user_id)
            .await
            .unwrap()
    }

    pub async fn balance(&self, account: &Account) -> Money {
        self.accounts
            .account(account.id, account.user_id)
            .await
            .unwrap()
            .balance
    }
}
