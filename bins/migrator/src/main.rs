//! Migration runner for the image catalog schema.
//!
//! Usage:
//!   migrator up      - Apply pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop the catalog tables and re-run migrations
//!
//! `fresh` only touches the catalog; blobs in the object store stay behind
//! and need a manual cleanup if the catalog is rebuilt from scratch.

use fable_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    // DATABASE_URL may come from a .env file in development
    dotenvy::dotenv().ok();

    cli::run_cli(Migrator).await;
}
