//! Generated suggestions, reminders and patterns shown to the user.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{new_id, now, InsightType};
use crate::db::{bool_from_int, Database};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight_id: String,
    pub contact_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub content: String,
    pub generated_at: String,
    pub expires_at: Option<String>,
    #[serde(deserialize_with = "bool_from_int")]
    pub actionable: bool,
}

#[derive(Debug, Clone)]
pub struct NewInsight {
    pub contact_id: String,
    pub user_id: String,
    pub insight_type: InsightType,
    pub content: String,
    pub expires_at: Option<String>,
    pub actionable: bool,
}

pub struct InsightRepo {
    db: Database,
}

impl InsightRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(contact_id = %new.contact_id, kind = %new.insight_type))]
    pub async fn create(&self, new: NewInsight) -> Result<Insight, Error> {
        let insight = Insight {
            insight_id: new_id(),
            contact_id: new.contact_id,
            user_id: new.user_id,
            insight_type: new.insight_type,
            content: new.content,
            generated_at: now(),
            expires_at: new.expires_at,
            actionable: new.actionable,
        };

        self.db
            .run(
                r#"
                INSERT INTO insight (
                    insight_id, contact_id, user_id, type, content,
                    generated_at, expires_at, actionable
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                (
                    &insight.insight_id,
                    &insight.contact_id,
                    &insight.user_id,
                    insight.insight_type.as_str(),
                    &insight.content,
                    &insight.generated_at,
                    &insight.expires_at,
                    insight.actionable,
                ),
            )
            .await?;
        Ok(insight)
    }

    /// Insights that have not expired as of `at` (RFC 3339), newest first.
    #[instrument(skip(self))]
    pub async fn active_for_contact(&self, contact_id: &str, at: &str) -> Result<Vec<Insight>, Error> {
        self.db
            .query_as(
                r#"
                SELECT * FROM insight
                WHERE contact_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)
                ORDER BY generated_at DESC
                "#,
                (contact_id, at),
            )
            .await
    }

    /// Drop every insight that expired before `at`. Returns the count removed.
    #[instrument(skip(self))]
    pub async fn delete_expired(&self, at: &str) -> Result<usize, Error> {
        let removed = self
            .db
            .run(
                "DELETE FROM insight WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                [at],
            )
            .await?;
        if removed > 0 {
            info!(removed, "Expired insights removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SeedProfile, LOCAL_USER_ID};
    use crate::repo::{ContactRepo, NewContact};

    fn insight(contact_id: &str, expires_at: Option<&str>) -> NewInsight {
        NewInsight {
            contact_id: contact_id.to_string(),
            user_id: LOCAL_USER_ID.to_string(),
            insight_type: InsightType::Suggestion,
            content: "ask about the marathon".to_string(),
            expires_at: expires_at.map(str::to_string),
            actionable: true,
        }
    }

    #[tokio::test]
    async fn test_expiry() {
        let db = Database::open_memory();
        db.initialize(&SeedProfile::default()).await.unwrap();
        let contact = ContactRepo::new(db.clone())
            .create(NewContact::new(LOCAL_USER_ID, "Amy"))
            .await
            .unwrap();
        let repo = InsightRepo::new(db);

        let kept = repo.create(insight(&contact.contact_id, None)).await.unwrap();
        repo.create(insight(&contact.contact_id, Some("2026-01-01T00:00:00+00:00")))
            .await
            .unwrap();

        let active = repo
            .active_for_contact(&contact.contact_id, "2026-06-01T00:00:00+00:00")
            .await
            .unwrap();
        assert_eq!(active, vec![kept]);
        assert!(active[0].actionable);

        let removed = repo.delete_expired("2026-06-01T00:00:00+00:00").await.unwrap();
        assert_eq!(removed, 1);
    }
}
