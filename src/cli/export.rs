//! Export the database as JSON.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Error;

/// Run the export command.
pub async fn run(config: &Config, output: Option<&Path>) -> Result<(), Error> {
    let db = config.database();
    db.initialize(&config.seed_profile()).await?;

    let export = db.export().await?;
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            let rows: usize = export.values().map(Vec::len).sum();
            info!(path = %path.display(), tables = export.len(), rows, "Wrote export");
            println!("Exported {} rows from {} tables to {}", rows, export.len(), path.display());
        }
        None => println!("{}", json),
    }

    db.close().await
}
