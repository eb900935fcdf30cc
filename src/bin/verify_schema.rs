//! Compares the `clients` table in the database with the field registry.
//!
//! Exits non-zero when registry columns are missing from the table.

use client_records_api::schema::{all_columns, CLIENTS_TABLE};
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let columns: Vec<(String, String)> = sqlx::query_as(
        "SELECT column_name, data_type FROM information_schema.columns
         WHERE table_name = $1 AND table_schema = current_schema()
         ORDER BY ordinal_position",
    )
    .bind(CLIENTS_TABLE)
    .fetch_all(&pool)
    .await?;

    if columns.is_empty() {
        anyhow::bail!("Table '{}' not found; apply sql/clients.sql first", CLIENTS_TABLE);
    }

    println!("Table {} ({} columns):", CLIENTS_TABLE, columns.len());
    for (name, data_type) in &columns {
        println!("  {} ({})", name, data_type);
    }

    let actual: BTreeSet<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    let mut expected: BTreeSet<&str> = all_columns().into_iter().collect();
    expected.extend(["created_at", "updated_at"]);

    let unexpected: Vec<&&str> = actual.difference(&expected).collect();
    if !unexpected.is_empty() {
        println!("\nColumns not in the registry (ignored by the service):");
        for name in unexpected {
            println!("  {}", name);
        }
    }

    let missing: Vec<&&str> = expected.difference(&actual).collect();
    if !missing.is_empty() {
        println!("\nRegistry columns missing from the table:");
        for name in &missing {
            println!("  {}", name);
        }
        anyhow::bail!("{} column(s) missing from '{}'", missing.len(), CLIENTS_TABLE);
    }

    println!("\n✓ Schema matches the registry");
    Ok(())
}
