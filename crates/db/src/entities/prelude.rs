//! Re-exports of every entity under its table name.

pub use super::accounts::Entity as Accounts;
pub use super::transactions::Entity as Transactions;
pub use super::users::Entity as Users;
