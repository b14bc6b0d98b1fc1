//! A transfer cancelled by the operation timeout in the middle of its unit
//! of work must leave no trace.
//!
//! A second connection holds the SQLite write lock, so the transfer reads and
//! locks its rows, then stalls on the guarded debit until the engine's
//! timeout drops the open transaction.

mod common;

use std::path::PathBuf;

use banka_core::{LedgerError, TransferEngine};
use banka_db::entities::{transactions, users};
use banka_db::migration::{Migrator, MigratorTrait};
use banka_shared::{DatabaseConfig, LedgerConfig, Money};
use common::harness_on;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait};

struct TempDb(PathBuf);

impl TempDb {
    fn new(name: &str) -> Self {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let file = format!("banka_{name}_{}_{nanos}.db", std::process::id());
        Self(std::env::temp_dir().join(file))
    }

    fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.0.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.0.display()));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_mid_transfer_rolls_back() {
    let file = TempDb::new("cancel");
    let config = DatabaseConfig {
        max_connections: 2,
        min_connections: 1,
        ..DatabaseConfig::with_url(file.url())
    };
    let db = banka_db::connect(&config).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let h = harness_on(db.clone());
    let a = h.funded_user("alice", 1_000).await;
    let b = h.funded_user("bob", 0).await;
    let rows_before = transactions::Entity::find().count(&db).await.unwrap();

    let engine = TransferEngine::new(
        h.accounts.clone(),
        h.users.clone(),
        LedgerConfig {
            operation_timeout_ms: 300,
        },
    );

    // Take the write lock on the other pooled connection.
    let blocker = db.begin().await.unwrap();
    users::Entity::update_many()
        .col_expr(users::Column::Email, Expr::value("alice@blocked.example"))
        .filter(users::Column::Id.eq(a.user_id.into_inner()))
        .exec(&blocker)
        .await
        .unwrap();

    let err = engine
        .transfer_by_accounts(a.user_id, a.id, b.id, Money::from_minor(400))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::StorageUnavailable(_)), "{err:?}");

    blocker.rollback().await.unwrap();

    assert_eq!(h.balance(&a).await, Money::from_minor(1_000));
    assert_eq!(h.balance(&b).await, Money::ZERO);
    assert_eq!(
        transactions::Entity::find().count(&db).await.unwrap(),
        rows_before
    );

    // The cancelled unit released its connection and locks.
    h.engine
        .transfer_by_accounts(a.user_id, a.id, b.id, Money::from_minor(400))
        .await
        .unwrap();
    assert_eq!(h.balance(&a).await, Money::from_minor(600));
    assert_eq!(h.balance(&b).await, Money::from_minor(400));
    assert_eq!(
        transactions::Entity::find().count(&db).await.unwrap(),
        rows_before + 1
    );
}
