//! Banka API Server
//!
//! Main entry point for the Banka ledger service.

use std::sync::Arc;

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use banka_api::{AppState, create_router};
use banka_core::TransferEngine;
use banka_db::migration::Migrator;
use banka_db::{AccountRepository, UserRepository, connect};
use banka_shared::{AppConfig, EmailService, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banka=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect(&config.database).await?;
    info!("Connected to database");

    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    let accounts = Arc::new(AccountRepository::new(db.clone()));
    let users = Arc::new(UserRepository::new(db));
    let mut engine = TransferEngine::new(accounts, users, config.ledger.clone());

    if config.email.enabled {
        info!(
            smtp_host = %config.email.smtp_host,
            smtp_port = %config.email.smtp_port,
            "Transfer notifications enabled"
        );
        engine = engine.with_notifier(Arc::new(EmailService::new(config.email.clone())));
    } else {
        info!("Transfer notifications disabled");
    }

    let jwt_service = JwtService::new(JwtConfig::from(&config.jwt));

    let state = AppState {
        engine: Arc::new(engine),
        jwt_service: Arc::new(jwt_service),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
