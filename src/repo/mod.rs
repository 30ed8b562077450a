//! Typed repositories over the storage façade.

mod ai_logs;
mod cognitive;
mod contacts;
mod insights;
mod interactions;
mod reminders;
mod types;
mod users;

pub use ai_logs::{AiLogRepo, AiProcessingLog};
pub use cognitive::{CognitiveUnit, CognitiveUnitRepo, NewCognitiveUnit};
pub use contacts::{Contact, ContactRepo, ContactUpdate, NewContact};
pub use insights::{Insight, InsightRepo, NewInsight};
pub use interactions::{Interaction, InteractionRepo, NewInteraction};
pub use reminders::{NewReminder, Reminder, ReminderRepo};
pub use types::{
    AiStatus, InsightType, Priority, Relationship, ReminderStatus, ReminderType, UnitCategory,
    UnitStatus,
};
pub use users::{User, UserRepo, UserUpdate};

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::types::Value as SqlValue;

use crate::error::Error;

fn identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A partial update: only the fields that were set get written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Vec<(String, SqlValue)>,
}

/// Rendered `UPDATE` statement with parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, replacing an earlier value for the column.
    pub fn set(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((column.to_string(), value)),
        }
        self
    }

    /// Set `column` only when `value` is present.
    pub fn maybe<V: Into<SqlValue>>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Render `UPDATE table SET ... WHERE key_column = ?N`.
    ///
    /// Every column must appear in `allowed`. `touch` names a timestamp
    /// column that is set to the current time alongside the patch. Returns
    /// `None` for an empty patch.
    pub fn to_update(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        allowed: &[&str],
        touch: Option<&str>,
    ) -> Result<Option<UpdateStatement>, Error> {
        if self.is_empty() {
            return Ok(None);
        }

        for name in [table, key_column].into_iter().chain(self.columns()).chain(touch) {
            if !identifier().is_match(name) {
                return Err(Error::InvalidValue(format!("bad identifier: {name}")));
            }
        }
        if let Some(name) = self.columns().find(|c| !allowed.contains(c)) {
            return Err(Error::InvalidValue(format!(
                "column {name} cannot be updated on {table}"
            )));
        }

        let mut assignments = Vec::with_capacity(self.fields.len() + 1);
        let mut params = Vec::with_capacity(self.fields.len() + 2);
        for (name, value) in &self.fields {
            params.push(value.clone());
            assignments.push(format!("{name} = ?{}", params.len()));
        }
        if let Some(column) = touch.filter(|c| !self.columns().any(|name| name == *c)) {
            params.push(SqlValue::Text(now()));
            assignments.push(format!("{column} = ?{}", params.len()));
        }
        params.push(SqlValue::Text(key.to_string()));

        let sql = format!(
            "UPDATE {table} SET {} WHERE {key_column} = ?{}",
            assignments.join(", "),
            params.len()
        );
        Ok(Some(UpdateStatement { sql, params }))
    }
}
