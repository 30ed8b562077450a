//! Logged encounters with a contact.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{new_id, now};
use crate::db::Database;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub contact_id: String,
    pub user_id: String,
    pub date: String,
    pub context: Option<String>,
    /// User-entered summary.
    pub summary: Option<String>,
    pub raw_notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub contact_id: String,
    pub user_id: String,
    pub date: String,
    pub context: Option<String>,
    pub summary: Option<String>,
    pub raw_notes: Option<String>,
}

pub struct InteractionRepo {
    db: Database,
}

impl InteractionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(contact_id = %new.contact_id))]
    pub async fn create(&self, new: NewInteraction) -> Result<Interaction, Error> {
        let interaction = Interaction {
            interaction_id: new_id(),
            contact_id: new.contact_id,
            user_id: new.user_id,
            date: new.date,
            context: new.context,
            summary: new.summary,
            raw_notes: new.raw_notes,
            created_at: now(),
        };

        self.db
            .run(
                r#"
                INSERT INTO interaction (
                    interaction_id, contact_id, user_id, date, context,
                    summary, raw_notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                (
                    &interaction.interaction_id,
                    &interaction.contact_id,
                    &interaction.user_id,
                    &interaction.date,
                    &interaction.context,
                    &interaction.summary,
                    &interaction.raw_notes,
                    &interaction.created_at,
                ),
            )
            .await?;
        Ok(interaction)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, interaction_id: &str) -> Result<Option<Interaction>, Error> {
        self.db
            .query_one(
                "SELECT * FROM interaction WHERE interaction_id = ?1",
                [interaction_id],
            )
            .await
    }

    /// Interactions with a contact, most recent first.
    #[instrument(skip(self))]
    pub async fn list_for_contact(&self, contact_id: &str) -> Result<Vec<Interaction>, Error> {
        self.db
            .query_as(
                r#"
                SELECT * FROM interaction
                WHERE contact_id = ?1
                ORDER BY date DESC, created_at DESC
                "#,
                [contact_id],
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, interaction_id: &str) -> Result<bool, Error> {
        let changed = self
            .db
            .run(
                "DELETE FROM interaction WHERE interaction_id = ?1",
                [interaction_id],
            )
            .await?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SeedProfile, LOCAL_USER_ID};
    use crate::repo::{ContactRepo, NewContact};

    fn visit(contact_id: &str, date: &str) -> NewInteraction {
        NewInteraction {
            contact_id: contact_id.to_string(),
            user_id: LOCAL_USER_ID.to_string(),
            date: date.to_string(),
            context: Some("coffee".to_string()),
            summary: Some("talked about the move".to_string()),
            raw_notes: None,
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_and_cascade() {
        let db = Database::open_memory();
        db.initialize(&SeedProfile::default()).await.unwrap();
        let contacts = ContactRepo::new(db.clone());
        let repo = InteractionRepo::new(db.clone());

        let c = contacts
            .create(NewContact::new(LOCAL_USER_ID, "Amy"))
            .await
            .unwrap();
        repo.create(visit(&c.contact_id, "2026-01-02")).await.unwrap();
        repo.create(visit(&c.contact_id, "2026-03-04")).await.unwrap();

        let listed = repo.list_for_contact(&c.contact_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].date, "2026-03-04");

        contacts.delete(&c.contact_id).await.unwrap();
        assert!(repo.list_for_contact(&c.contact_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_contact_rejected() {
        let db = Database::open_memory();
        db.initialize(&SeedProfile::default()).await.unwrap();
        let repo = InteractionRepo::new(db);
        let err = repo.create(visit("missing", "2026-01-01")).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
    }
}
