//! Contacts ("friends") tracked by the user.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{new_id, now, Patch, Relationship};
use crate::db::{escape_like, Database};
use crate::error::Error;

const UPDATABLE: &[&str] = &[
    "name",
    "relationship",
    "contact_info",
    "birthday",
    "notes",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub contact_id: String,
    pub user_id: String,
    pub name: String,
    pub relationship: Relationship,
    pub contact_info: Option<String>,
    pub birthday: Option<String>,
    /// Rolling cognitive summary.
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub user_id: String,
    pub name: String,
    pub relationship: Relationship,
    pub contact_info: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
}

impl NewContact {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            relationship: Relationship::Friend,
            contact_info: None,
            birthday: None,
            notes: None,
        }
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationship = relationship;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub relationship: Option<Relationship>,
    pub contact_info: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
}

impl ContactUpdate {
    pub fn into_patch(self) -> Patch {
        Patch::new()
            .maybe("name", self.name)
            .maybe("relationship", self.relationship.map(|r| r.as_str().to_string()))
            .maybe("contact_info", self.contact_info)
            .maybe("birthday", self.birthday)
            .maybe("notes", self.notes)
    }
}

pub struct ContactRepo {
    db: Database,
}

impl ContactRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(user_id = %new.user_id))]
    pub async fn create(&self, new: NewContact) -> Result<Contact, Error> {
        let created_at = now();
        let contact = Contact {
            contact_id: new_id(),
            user_id: new.user_id,
            name: new.name,
            relationship: new.relationship,
            contact_info: new.contact_info,
            birthday: new.birthday,
            notes: new.notes,
            updated_at: created_at.clone(),
            created_at,
        };

        self.db
            .run(
                r#"
                INSERT INTO contact (
                    contact_id, user_id, name, relationship, contact_info,
                    birthday, notes, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                (
                    &contact.contact_id,
                    &contact.user_id,
                    &contact.name,
                    contact.relationship.as_str(),
                    &contact.contact_info,
                    &contact.birthday,
                    &contact.notes,
                    &contact.created_at,
                    &contact.updated_at,
                ),
            )
            .await?;
        debug!(contact_id = %contact.contact_id, "Created contact");
        Ok(contact)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, contact_id: &str) -> Result<Option<Contact>, Error> {
        self.db
            .query_one("SELECT * FROM contact WHERE contact_id = ?1", [contact_id])
            .await
    }

    /// All contacts of a user, alphabetical.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Contact>, Error> {
        self.db
            .query_as(
                "SELECT * FROM contact WHERE user_id = ?1 ORDER BY name COLLATE NOCASE",
                [user_id],
            )
            .await
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, contact_id: &str, update: ContactUpdate) -> Result<(), Error> {
        let Some(stmt) = update.into_patch().to_update(
            "contact",
            "contact_id",
            contact_id,
            UPDATABLE,
            Some("updated_at"),
        )?
        else {
            return Ok(());
        };
        let changed = self
            .db
            .run(&stmt.sql, rusqlite::params_from_iter(stmt.params.iter()))
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("contact {contact_id}")));
        }
        Ok(())
    }

    /// Delete a contact together with its interactions, units, insights and
    /// reminders.
    #[instrument(skip(self))]
    pub async fn delete(&self, contact_id: &str) -> Result<bool, Error> {
        let changed = self
            .db
            .run("DELETE FROM contact WHERE contact_id = ?1", [contact_id])
            .await?;
        Ok(changed > 0)
    }

    /// Case-insensitive substring search over name and notes.
    #[instrument(skip(self))]
    pub async fn search(&self, user_id: &str, text: &str) -> Result<Vec<Contact>, Error> {
        let pattern = format!("%{}%", escape_like(text.trim()));
        self.db
            .query_as(
                r#"
                SELECT * FROM contact
                WHERE user_id = ?1
                  AND (name LIKE ?2 ESCAPE '\' OR notes LIKE ?2 ESCAPE '\')
                ORDER BY name COLLATE NOCASE
                "#,
                (user_id, &pattern),
            )
            .await
    }

    /// Pick one contact at random, for "who should I reach out to" prompts.
    #[instrument(skip(self))]
    pub async fn random(&self, user_id: &str) -> Result<Option<Contact>, Error> {
        self.db
            .query_one(
                "SELECT * FROM contact WHERE user_id = ?1 ORDER BY RANDOM() LIMIT 1",
                [user_id],
            )
            .await
    }

    /// Append a line to the contact's rolling summary.
    #[instrument(skip(self, line))]
    pub async fn append_summary(&self, contact_id: &str, line: &str) -> Result<(), Error> {
        let changed = self
            .db
            .run(
                r#"
                UPDATE contact
                SET notes = CASE
                        WHEN notes IS NULL OR notes = '' THEN ?1
                        ELSE notes || char(10) || ?1
                    END,
                    updated_at = ?2
                WHERE contact_id = ?3
                "#,
                (line, &now(), contact_id),
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("contact {contact_id}")));
        }
        Ok(())
    }
}
