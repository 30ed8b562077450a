//! Import an export JSON document.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::Error;

/// Run the import command.
pub async fn run(config: &Config, file: &Path) -> Result<(), Error> {
    let content = fs::read_to_string(file)?;
    let data: serde_json::Value = serde_json::from_str(&content)?;

    let db = config.database();
    db.initialize(&config.seed_profile()).await?;
    let report = db.import(&data).await?;
    db.save_and_close().await?;

    println!(
        "Imported {} rows into {} tables ({} failed)",
        report.rows, report.tables, report.failed_rows
    );
    if !report.skipped_tables.is_empty() {
        println!("Skipped unknown tables: {}", report.skipped_tables.join(", "));
    }
    Ok(())
}
