//! Imports client rows from a JSON file into the database.
//!
//! Usage: `import_clients <rows.json>` where the file holds either an array
//! of row objects or `{"clients": [...]}`.

use client_records_api::client_store::PgClientStore;
use client_records_api::db::Database;
use client_records_api::importer::{import_batch, IMPORT_ROWS};
use client_records_api::records::ClientRecordWriter;
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: import_clients <rows.json>"))?;

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_URL must be set"))?;

    println!("=== Import Client Rows ===\n");

    let content = tokio::fs::read_to_string(&path).await?;
    let body: Value = serde_json::from_str(&content)?;
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove(IMPORT_ROWS) {
            Some(Value::Array(rows)) => rows,
            _ => anyhow::bail!("'{}' must contain a \"{}\" array", path, IMPORT_ROWS),
        },
        _ => anyhow::bail!("'{}' must contain a JSON array of rows", path),
    };
    println!("Read {} rows from {}", rows.len(), path);

    let db = Database::new(&database_url, 2).await?;
    println!("✓ Database connected\n");

    let writer = ClientRecordWriter::new(Arc::new(PgClientStore::new(db.pool.clone())));
    let report = import_batch(&writer, &rows).await;

    for error in &report.errors {
        println!("  ✗ Row {}: {}", error.row, error.error);
    }

    println!("\n=== Import Summary ===");
    println!("Imported: {}", report.imported);
    println!("Failed:   {}", report.failed);

    db.close().await;
    Ok(())
}
