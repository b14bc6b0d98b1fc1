//! Identity-to-account resolution for handle-based operations.

use std::sync::Arc;

use banka_shared::{AccountId, UserId};

use super::error::LedgerError;
use super::store::{LedgerStore, UserDirectory};
use super::types::UserProfile;

/// Read-only lookups from handles and users to accounts.
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn LedgerStore>,
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for AccountDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDirectory").finish_non_exhaustive()
    }
}

impl AccountDirectory {
    /// Creates a directory over a store and the identity subsystem.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { store, users }
    }

    /// Resolves a handle to a user id.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if no user has this handle.
    pub async fn resolve_username(&self, handle: &str) -> Result<UserId, LedgerError> {
        self.users
            .user_id_by_username(handle)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(handle.to_string()))
    }

    /// Returns the user's lowest-id account.
    ///
    /// # Errors
    ///
    /// Returns `DefaultAccountMissing` if the user owns no account.
    pub async fn default_account_for(&self, user_id: UserId) -> Result<AccountId, LedgerError> {
        Ok(self.store.first_account_by_user(user_id).await?.id)
    }

    /// Resolves the owner of an account to a contactable profile.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for a missing account and `UserNotFound`
    /// when the owner is unknown to the identity subsystem.
    pub async fn contact_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<UserProfile, LedgerError> {
        let owner = self.store.owner_of_account(account_id).await?;
        self.users
            .user_by_id(owner)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(owner.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::ledger::store::{MockLedgerStore, MockUserDirectory};

    #[tokio::test]
    async fn test_resolve_username_not_found() {
        let mut users = MockUserDirectory::new();
        users.expect_user_id_by_username().returning(|_| Ok(None));
        let directory = AccountDirectory::new(Arc::new(MockLedgerStore::new()), Arc::new(users));

        assert_eq!(
            directory.resolve_username("ghost").await.unwrap_err(),
            LedgerError::UserNotFound("ghost".into())
        );
    }

    #[tokio::test]
    async fn test_storage_error_passes_through() {
        let mut store = MockLedgerStore::new();
        store
            .expect_first_account_by_user()
            .returning(|_| Err(LedgerError::StorageUnavailable("down".into())));
        let directory = AccountDirectory::new(Arc::new(store), Arc::new(MockUserDirectory::new()));

        assert!(
            directory
                .default_account_for(UserId(1))
                .await
                .unwrap_err()
                .is_storage()
        );
    }

    #[tokio::test]
    async fn test_contact_for_account() {
        let ledger = Arc::new(InMemoryLedger::new());
        let bob = ledger.register_user("bob", "bob@example.com").await;
        let account = ledger.create_account(bob.id).await.unwrap();
        let directory = AccountDirectory::new(ledger.clone(), ledger);

        assert_eq!(directory.contact_for_account(account.id).await.unwrap(), bob);
        assert_eq!(
            directory.contact_for_account(AccountId(42)).await.unwrap_err(),
            LedgerError::AccountNotFound(AccountId(42))
        );
    }
}
