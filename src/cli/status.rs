//! Show database status.

use std::fs;

use crate::config::Config;
use crate::error::Error;

/// Run the status command.
pub async fn run(config: &Config) -> Result<(), Error> {
    let path = &config.storage.path;
    println!("Storage: {} ({:?})", path.display(), config.storage.mode);

    if !path.exists() {
        println!("Not initialized. Run 'kith init'.");
        return Ok(());
    }
    println!("Size: {}", format_size(fs::metadata(path)?.len()));

    let db = config.database();
    println!("Schema version: {}", db.schema_version().await?);

    for table in db.user_tables().await? {
        let rows = db
            .query(&format!("SELECT COUNT(*) AS n FROM \"{}\"", table), [])
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get("n"))
            .and_then(|n| n.as_i64())
            .unwrap_or(0);
        println!("  {:<20} {}", table, count);
    }

    db.close().await
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
