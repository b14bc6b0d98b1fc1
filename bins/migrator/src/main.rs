//! Schema migrations for the Banka ledger tables.
//!
//! Reads `DATABASE_URL` (or `--database-url`). Usage:
//!   migrator up      - apply pending migrations
//!   migrator down    - revert the last migration
//!   migrator status  - list applied and pending migrations
//!   migrator fresh   - drop every table, then apply all migrations

use banka_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI installs its own tracing subscriber.
    cli::run_cli(Migrator).await;
}
