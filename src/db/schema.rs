//! Schema definition and first-run bootstrap.

use tracing::{info, warn};

use super::Database;
use crate::error::Error;

/// Version written once the schema below has been applied.
pub const SCHEMA_VERSION: u32 = 1;

/// Fixed identifier of the single local profile.
pub const LOCAL_USER_ID: &str = "u_local";

/// Name given to the seeded profile.
pub const DEFAULT_USER_NAME: &str = "Me";

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user (
    user_id      TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    contact_info TEXT,
    birthday     TEXT,
    notes        TEXT,
    created_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS contact (
    contact_id   TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    name         TEXT NOT NULL,
    relationship TEXT NOT NULL DEFAULT 'friend'
                 CHECK (relationship IN ('friend', 'best_friend', 'colleague', 'family')),
    contact_info TEXT,
    birthday     TEXT,
    notes        TEXT,
    created_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_contact_user FOREIGN KEY (user_id)
        REFERENCES user(user_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_contact_user ON contact(user_id);
CREATE INDEX IF NOT EXISTS idx_contact_name ON contact(name);

CREATE TABLE IF NOT EXISTS interaction (
    interaction_id TEXT PRIMARY KEY,
    contact_id     TEXT NOT NULL,
    user_id        TEXT NOT NULL,
    date           TEXT NOT NULL,
    context        TEXT,
    summary        TEXT,
    raw_notes      TEXT,
    created_at     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_interaction_contact FOREIGN KEY (contact_id)
        REFERENCES contact(contact_id) ON DELETE CASCADE,
    CONSTRAINT fk_interaction_user FOREIGN KEY (user_id)
        REFERENCES user(user_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_interaction_contact ON interaction(contact_id);
CREATE INDEX IF NOT EXISTS idx_interaction_date ON interaction(date);

CREATE TABLE IF NOT EXISTS cognitive_unit (
    unit_id          TEXT PRIMARY KEY,
    contact_id       TEXT NOT NULL,
    category         TEXT NOT NULL
                     CHECK (category IN ('work_style', 'values', 'communication', 'behavior')),
    essence          TEXT NOT NULL,
    confidence_score INTEGER NOT NULL CHECK (confidence_score BETWEEN 1 AND 5),
    status           TEXT NOT NULL DEFAULT 'active'
                     CHECK (status IN ('active', 'inactive', 'superseded')),
    created_at       TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at       TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_unit_contact FOREIGN KEY (contact_id)
        REFERENCES contact(contact_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_unit_contact_status ON cognitive_unit(contact_id, status);

CREATE TABLE IF NOT EXISTS insight (
    insight_id   TEXT PRIMARY KEY,
    contact_id   TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    type         TEXT NOT NULL CHECK (type IN ('suggestion', 'reminder', 'pattern')),
    content      TEXT NOT NULL,
    generated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at   TEXT,
    actionable   INTEGER NOT NULL DEFAULT 0 CHECK (actionable IN (0, 1)),
    CONSTRAINT fk_insight_contact FOREIGN KEY (contact_id)
        REFERENCES contact(contact_id) ON DELETE CASCADE,
    CONSTRAINT fk_insight_user FOREIGN KEY (user_id)
        REFERENCES user(user_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_insight_contact ON insight(contact_id);

CREATE TABLE IF NOT EXISTS reminder (
    reminder_id TEXT PRIMARY KEY,
    contact_id  TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    unit_id     TEXT,
    type        TEXT NOT NULL CHECK (type IN ('follow_up', 'birthday', 'check_in')),
    due_date    TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    priority    TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high')),
    status      TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'snoozed')),
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_reminder_contact FOREIGN KEY (contact_id)
        REFERENCES contact(contact_id) ON DELETE CASCADE,
    CONSTRAINT fk_reminder_user FOREIGN KEY (user_id)
        REFERENCES user(user_id) ON DELETE CASCADE,
    CONSTRAINT fk_reminder_unit FOREIGN KEY (unit_id)
        REFERENCES cognitive_unit(unit_id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_reminder_user_due ON reminder(user_id, status, due_date);

CREATE TABLE IF NOT EXISTS ai_processing_log (
    log_id         TEXT PRIMARY KEY,
    interaction_id TEXT NOT NULL,
    input_text     TEXT NOT NULL,
    output_json    TEXT,
    status         TEXT NOT NULL DEFAULT 'pending'
                   CHECK (status IN ('success', 'error', 'pending')),
    confirmed      INTEGER NOT NULL DEFAULT 0 CHECK (confirmed IN (0, 1)),
    unit_id        TEXT,
    created_at     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT fk_log_interaction FOREIGN KEY (interaction_id)
        REFERENCES interaction(interaction_id) ON DELETE CASCADE,
    CONSTRAINT fk_log_unit FOREIGN KEY (unit_id)
        REFERENCES cognitive_unit(unit_id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_log_interaction ON ai_processing_log(interaction_id);
"#;

/// Profile values used when seeding the local user row.
#[derive(Debug, Clone)]
pub struct SeedProfile {
    pub user_id: String,
    pub name: String,
}

impl Default for SeedProfile {
    fn default() -> Self {
        Self {
            user_id: LOCAL_USER_ID.to_string(),
            name: DEFAULT_USER_NAME.to_string(),
        }
    }
}

/// Bring the store up to [`SCHEMA_VERSION`] and seed the local profile.
///
/// Called through [`Database::initialize`], which guarantees this runs at
/// most once per `Database`. Returns the stored version afterwards.
pub(super) async fn bootstrap(db: &Database, seed: &SeedProfile) -> Result<u32, Error> {
    let version = db.schema_version().await?;

    if version == 0 {
        info!("Applying schema");
        let report = db.execute(SCHEMA).await?;
        if report.failed > 0 {
            warn!(failed = report.failed, "Schema applied with failing statements");
        }
        db.set_schema_version(SCHEMA_VERSION).await?;

        let inserted = db
            .run(
                "INSERT OR IGNORE INTO user (user_id, name) VALUES (?1, ?2)",
                [seed.user_id.as_str(), seed.name.as_str()],
            )
            .await?;
        info!(user_id = %seed.user_id, inserted, "Seeded local profile");
    } else if version < SCHEMA_VERSION {
        migrate(db, version).await?;
    } else {
        info!(version, "Schema already initialized");
    }

    db.save_and_close().await?;
    db.schema_version().await
}

/// Upgrade path for stores older than [`SCHEMA_VERSION`]. Version 1 is the
/// first schema, so there is nothing to migrate from yet.
async fn migrate(db: &Database, from: u32) -> Result<(), Error> {
    warn!(from, to = SCHEMA_VERSION, "No migration registered");
    db.set_schema_version(SCHEMA_VERSION).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::split_statements;

    #[test]
    fn test_schema_splits_cleanly() {
        let stmts = split_statements(SCHEMA);
        let tables = stmts
            .iter()
            .filter(|s| s.starts_with("CREATE TABLE"))
            .count();
        assert_eq!(tables, 7);
        assert!(stmts.iter().all(|s| s.starts_with("CREATE")));
    }

    #[test]
    fn test_schema_applies() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        // Applying twice is harmless.
        conn.execute_batch(SCHEMA).unwrap();
    }
}
