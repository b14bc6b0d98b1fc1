//! Ledger core for Banka.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence is reached through the [`ledger::LedgerStore`] and
//! [`ledger::UserDirectory`] traits, notification delivery through [`notify::Notifier`].
//!
//! # Modules
//!
//! - `ledger` - Accounts, transfers, and the append-only transaction log
//! - `notify` - Best-effort post-commit notifications

pub mod ledger;
pub mod notify;

pub use ledger::{
    Account, AccountDirectory, Caller, InMemoryLedger, LedgerError, LedgerStore,
    LedgerTransaction, TransactionKind, TransferEngine, UserDirectory, UserProfile,
};
pub use notify::{Notifier, NotifyError, TransferNotice};
