//! Scheduled follow-ups, birthdays and check-ins.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{new_id, now, Priority, ReminderStatus, ReminderType};
use crate::db::Database;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub contact_id: String,
    pub user_id: String,
    /// Cognitive unit that prompted the reminder; cleared if the unit is deleted.
    pub unit_id: Option<String>,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    pub due_date: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: ReminderStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub contact_id: String,
    pub user_id: String,
    pub unit_id: Option<String>,
    pub reminder_type: ReminderType,
    pub due_date: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
}

pub struct ReminderRepo {
    db: Database,
}

impl ReminderRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(contact_id = %new.contact_id, kind = %new.reminder_type))]
    pub async fn create(&self, new: NewReminder) -> Result<Reminder, Error> {
        let created_at = now();
        let reminder = Reminder {
            reminder_id: new_id(),
            contact_id: new.contact_id,
            user_id: new.user_id,
            unit_id: new.unit_id,
            reminder_type: new.reminder_type,
            due_date: new.due_date,
            title: new.title,
            description: new.description,
            priority: new.priority,
            status: ReminderStatus::Pending,
            updated_at: created_at.clone(),
            created_at,
        };

        self.db
            .run(
                r#"
                INSERT INTO reminder (
                    reminder_id, contact_id, user_id, unit_id, type, due_date,
                    title, description, priority, status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                (
                    &reminder.reminder_id,
                    &reminder.contact_id,
                    &reminder.user_id,
                    &reminder.unit_id,
                    reminder.reminder_type.as_str(),
                    &reminder.due_date,
                    &reminder.title,
                    &reminder.description,
                    reminder.priority.as_str(),
                    reminder.status.as_str(),
                    &reminder.created_at,
                    &reminder.updated_at,
                ),
            )
            .await?;
        Ok(reminder)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, reminder_id: &str) -> Result<Option<Reminder>, Error> {
        self.db
            .query_one("SELECT * FROM reminder WHERE reminder_id = ?1", [reminder_id])
            .await
    }

    /// Pending reminders due on or before `before`, soonest first.
    #[instrument(skip(self))]
    pub async fn due(&self, user_id: &str, before: &str) -> Result<Vec<Reminder>, Error> {
        self.db
            .query_as(
                r#"
                SELECT * FROM reminder
                WHERE user_id = ?1 AND status = 'pending' AND due_date <= ?2
                ORDER BY due_date ASC
                "#,
                (user_id, before),
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, reminder_id: &str, status: ReminderStatus) -> Result<(), Error> {
        let changed = self
            .db
            .run(
                "UPDATE reminder SET status = ?1, updated_at = ?2 WHERE reminder_id = ?3",
                (status.as_str(), &now(), reminder_id),
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("reminder {reminder_id}")));
        }
        Ok(())
    }
}
