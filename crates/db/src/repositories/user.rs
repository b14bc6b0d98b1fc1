//! User repository for database operations.

use async_trait::async_trait;
use banka_core::{LedgerError, UserDirectory, UserProfile};
use banka_shared::UserId;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use super::account::storage;
use crate::entities::users;

impl From<users::Model> for UserProfile {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId(model.id),
            username: model.username,
            email: model.email,
        }
    }
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including a duplicate handle or email.
    pub async fn create(&self, username: &str, email: &str) -> Result<users::Model, DbErr> {
        users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn user_id_by_username(&self, username: &str) -> Result<Option<UserId>, LedgerError> {
        Ok(self
            .find_by_username(username)
            .await
            .map_err(storage)?
            .map(|u| UserId(u.id)))
    }

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserProfile>, LedgerError> {
        Ok(self
            .find_by_id(user_id)
            .await
            .map_err(storage)?
            .map(UserProfile::from))
    }
}
