//! Property-based tests for the transfer engine.
//!
//! Random sequences of top-ups and transfers against the in-memory store
//! must conserve money, keep every balance non-negative, and leave a
//! transaction log that explains every balance.

use std::sync::Arc;

use banka_shared::{LedgerConfig, Money, UserId};
use proptest::prelude::*;

use super::{Account, InMemoryLedger, LedgerError, LedgerStore, TransferEngine};

const ACCOUNTS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    TopUp { account: usize, minor: i64 },
    Transfer { from: usize, to: usize, minor: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS, 1i64..5_000).prop_map(|(account, minor)| Op::TopUp { account, minor }),
        (0..ACCOUNTS, 0..ACCOUNTS, -100i64..8_000)
            .prop_map(|(from, to, minor)| Op::Transfer { from, to, minor }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn setup() -> (Arc<InMemoryLedger>, TransferEngine, Vec<Account>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = TransferEngine::new(ledger.clone(), ledger.clone(), LedgerConfig::default());
    let mut accounts = Vec::with_capacity(ACCOUNTS);
    for owner in 0..ACCOUNTS {
        let owner = UserId(i64::try_from(owner).unwrap() + 1);
        accounts.push(engine.create_account(owner).await.unwrap());
    }
    (ledger, engine, accounts)
}

proptest! {
    /// Global sum changes only by top-ups; failed transfers change nothing.
    #[test]
    fn prop_transfers_conserve_money(ops in prop::collection::vec(op_strategy(), 1..40)) {
        runtime().block_on(async {
            let (ledger, engine, accounts) = setup().await;
            let mut expected_total = Money::ZERO;

            for op in ops {
                match op {
                    Op::TopUp { account, minor } => {
                        let acc = &accounts[account];
                        engine.top_up(acc.user_id, acc.id, Money::from_minor(minor)).await.unwrap();
                        expected_total = expected_total + Money::from_minor(minor);
                    }
                    Op::Transfer { from, to, minor } => {
                        let (src, dst) = (&accounts[from], &accounts[to]);
                        let before_rows = ledger.transactions().await.len();
                        let before_src = ledger.balance_of(src.id).await.unwrap();
                        let before_dst = ledger.balance_of(dst.id).await.unwrap();

                        let result = engine
                            .transfer_by_accounts(src.user_id, src.id, dst.id, Money::from_minor(minor))
                            .await;

                        let after_src = ledger.balance_of(src.id).await.unwrap();
                        let after_dst = ledger.balance_of(dst.id).await.unwrap();
                        let after_rows = ledger.transactions().await.len();

                        match result {
                            Ok(_) => {
                                assert_eq!(after_src + after_dst, before_src + before_dst);
                                assert_eq!(after_rows, before_rows + 1);
                            }
                            Err(e) => {
                                assert!(matches!(
                                    e,
                                    LedgerError::InvalidAmount(_)
                                        | LedgerError::SelfTransfer
                                        | LedgerError::InsufficientFunds { .. }
                                ));
                                assert_eq!((after_src, after_dst), (before_src, before_dst));
                                assert_eq!(after_rows, before_rows);
                            }
                        }
                    }
                }
                assert_eq!(ledger.total_balance().await, expected_total);
            }

            let log = ledger.transactions().await;
            for acc in &accounts {
                let balance = ledger.balance_of(acc.id).await.unwrap();
                assert!(!balance.is_negative());
                let derived: Money = log.iter().map(|tx| tx.net_effect_on(acc.id)).sum();
                assert_eq!(derived, balance);
                let owned = ledger.account(acc.id, acc.user_id).await.unwrap();
                assert_eq!(owned.balance, balance);
            }
        });
    }
}
