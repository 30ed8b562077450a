//! Audit trail of AI analysis runs.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{new_id, now, AiStatus};
use crate::db::{bool_from_int, Database};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProcessingLog {
    pub log_id: String,
    pub interaction_id: String,
    pub input_text: String,
    pub output_json: Option<String>,
    pub status: AiStatus,
    #[serde(deserialize_with = "bool_from_int")]
    pub confirmed: bool,
    pub unit_id: Option<String>,
    pub created_at: String,
}

pub struct AiLogRepo {
    db: Database,
}

impl AiLogRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record one AI invocation for an interaction.
    #[instrument(skip(self, input_text, output_json))]
    pub async fn record(
        &self,
        interaction_id: &str,
        input_text: &str,
        output_json: Option<&serde_json::Value>,
        status: AiStatus,
    ) -> Result<AiProcessingLog, Error> {
        let log = AiProcessingLog {
            log_id: new_id(),
            interaction_id: interaction_id.to_string(),
            input_text: input_text.to_string(),
            output_json: output_json.map(serde_json::Value::to_string),
            status,
            confirmed: false,
            unit_id: None,
            created_at: now(),
        };

        self.db
            .run(
                r#"
                INSERT INTO ai_processing_log (
                    log_id, interaction_id, input_text, output_json,
                    status, confirmed, unit_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6)
                "#,
                (
                    &log.log_id,
                    &log.interaction_id,
                    &log.input_text,
                    &log.output_json,
                    log.status.as_str(),
                    &log.created_at,
                ),
            )
            .await?;
        Ok(log)
    }

    /// Mark a run as confirmed by the user, optionally linking the unit it
    /// produced.
    #[instrument(skip(self))]
    pub async fn confirm(&self, log_id: &str, unit_id: Option<&str>) -> Result<(), Error> {
        let changed = self
            .db
            .run(
                "UPDATE ai_processing_log SET confirmed = 1, unit_id = ?1 WHERE log_id = ?2",
                (unit_id, log_id),
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("AI log {log_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn for_interaction(&self, interaction_id: &str) -> Result<Vec<AiProcessingLog>, Error> {
        self.db
            .query_as(
                r#"
                SELECT * FROM ai_processing_log
                WHERE interaction_id = ?1
                ORDER BY created_at ASC
                "#,
                [interaction_id],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SeedProfile, LOCAL_USER_ID};
    use crate::repo::{
        CognitiveUnitRepo, ContactRepo, InteractionRepo, NewCognitiveUnit, NewContact,
        NewInteraction, UnitCategory,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_confirm() {
        let db = Database::open_memory();
        db.initialize(&SeedProfile::default()).await.unwrap();
        let contact = ContactRepo::new(db.clone())
            .create(NewContact::new(LOCAL_USER_ID, "Amy"))
            .await
            .unwrap();
        let interaction = InteractionRepo::new(db.clone())
            .create(NewInteraction {
                contact_id: contact.contact_id.clone(),
                user_id: LOCAL_USER_ID.to_string(),
                date: "2026-02-02".to_string(),
                context: None,
                summary: Some("lunch".to_string()),
                raw_notes: Some("she is switching teams".to_string()),
            })
            .await
            .unwrap();
        let unit = CognitiveUnitRepo::new(db.clone())
            .create(NewCognitiveUnit {
                contact_id: contact.contact_id.clone(),
                category: UnitCategory::WorkStyle,
                essence: "seeks new challenges".to_string(),
                confidence_score: 2,
            })
            .await
            .unwrap();

        let repo = AiLogRepo::new(db);
        let log = repo
            .record(
                &interaction.interaction_id,
                "she is switching teams",
                Some(&json!({"units": 1})),
                AiStatus::Success,
            )
            .await
            .unwrap();
        repo.confirm(&log.log_id, Some(&unit.unit_id)).await.unwrap();

        let logs = repo.for_interaction(&interaction.interaction_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].confirmed);
        assert_eq!(logs[0].unit_id.as_deref(), Some(unit.unit_id.as_str()));
        assert_eq!(logs[0].output_json.as_deref(), Some(r#"{"units":1}"#));
    }
}
