//! Account balances and fund movement.
//!
//! This module implements the ledger core:
//! - Domain types for accounts and ledger transactions
//! - Error kinds shared by every ledger operation
//! - Store and directory traits implemented by the persistence layer
//! - An in-memory store for tests and local runs
//! - Handle-to-account resolution
//! - The transfer engine that validates requests and delegates atomic work

pub mod directory;
pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use directory::AccountDirectory;
pub use engine::TransferEngine;
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use store::{LedgerStore, UserDirectory};
pub use types::{Account, Caller, LedgerTransaction, TransactionKind, TransferState, UserProfile};
