//! Run a SQL script against the database.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::Error;

/// Run the exec command.
pub async fn run(config: &Config, file: &Path, strict: bool) -> Result<(), Error> {
    let script = fs::read_to_string(file)?;

    let db = config.database();
    db.initialize(&config.seed_profile()).await?;
    let report = if strict {
        db.execute_strict(&script).await?
    } else {
        db.execute(&script).await?
    };
    db.save_and_close().await?;

    println!(
        "{} statements applied, {} failed{}",
        report.applied,
        report.failed,
        if report.atomic { " (atomic)" } else { "" }
    );
    Ok(())
}
