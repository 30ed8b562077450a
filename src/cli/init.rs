//! Initialize the kith database.

use tracing::info;

use crate::config::Config;
use crate::error::Error;

/// Run the init command.
pub async fn run(config: &Config) -> Result<(), Error> {
    let db = config.database();
    let version = db.initialize(&config.seed_profile()).await?;
    info!(version, path = %config.storage.path.display(), "Database ready");

    println!("Database ready at {}", config.storage.path.display());
    println!("Schema version: {}", version);
    Ok(())
}
