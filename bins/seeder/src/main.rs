//! Database seeder for Banka development and testing.
//!
//! Creates the demo users `alice` and `bob`, gives each a funded default
//! account, and prints an access token per user for trying the API locally.
//! Running it twice reuses the existing users and accounts.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use banka_core::{LedgerError, LedgerStore, TransferEngine};
use banka_db::migration::Migrator;
use banka_db::{AccountRepository, UserRepository};
use banka_shared::{AppConfig, JwtConfig, JwtService, Money, UserId};
use sea_orm_migration::MigratorTrait;

/// Demo users and their opening balances in minor units.
const DEMO_USERS: [(&str, i64); 2] = [("alice", 15_000), ("bob", 2_500)];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;

    println!("Connecting to database...");
    let db = banka_db::connect(&config.database).await?;
    Migrator::up(&db, None).await?;

    let users = UserRepository::new(db.clone());
    let accounts = Arc::new(AccountRepository::new(db));
    let engine = TransferEngine::new(
        accounts.clone(),
        Arc::new(users.clone()),
        config.ledger.clone(),
    );
    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_secs: 24 * 60 * 60,
    });

    for (username, opening) in DEMO_USERS {
        println!("Seeding {username}...");
        let user = match users.find_by_username(username).await? {
            Some(user) => {
                println!("  User already exists, skipping creation");
                user
            }
            None => {
                users
                    .create(username, &format!("{username}@banka.dev"))
                    .await?
            }
        };
        let user_id = UserId(user.id);

        let account = match accounts.first_account_by_user(user_id).await {
            Ok(account) => account,
            Err(LedgerError::DefaultAccountMissing(_)) => {
                let account = engine.create_account(user_id).await?;
                engine
                    .top_up(user_id, account.id, Money::from_minor(opening))
                    .await?;
                account
            }
            Err(e) => return Err(e.into()),
        };

        let token = jwt.generate_access_token(user_id, username)?;
        println!("  account {} (user {user_id})", account.id);
        println!("  token: {token}");
    }

    println!("Seeding complete!");
    Ok(())
}
