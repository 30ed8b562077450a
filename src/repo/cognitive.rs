//! AI-derived facts about a contact.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{new_id, now, UnitCategory, UnitStatus};
use crate::db::Database;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveUnit {
    pub unit_id: String,
    pub contact_id: String,
    pub category: UnitCategory,
    pub essence: String,
    pub confidence_score: u8,
    pub status: UnitStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewCognitiveUnit {
    pub contact_id: String,
    pub category: UnitCategory,
    pub essence: String,
    /// 1 (weak) to 5 (certain).
    pub confidence_score: u8,
}

pub struct CognitiveUnitRepo {
    db: Database,
}

impl CognitiveUnitRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(contact_id = %new.contact_id, category = %new.category))]
    pub async fn create(&self, new: NewCognitiveUnit) -> Result<CognitiveUnit, Error> {
        if !(1..=5).contains(&new.confidence_score) {
            return Err(Error::InvalidValue(format!(
                "confidence score {} outside 1..=5",
                new.confidence_score
            )));
        }

        let created_at = now();
        let unit = CognitiveUnit {
            unit_id: new_id(),
            contact_id: new.contact_id,
            category: new.category,
            essence: new.essence,
            confidence_score: new.confidence_score,
            status: UnitStatus::Active,
            updated_at: created_at.clone(),
            created_at,
        };

        self.db
            .run(
                r#"
                INSERT INTO cognitive_unit (
                    unit_id, contact_id, category, essence,
                    confidence_score, status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                (
                    &unit.unit_id,
                    &unit.contact_id,
                    unit.category.as_str(),
                    &unit.essence,
                    unit.confidence_score,
                    unit.status.as_str(),
                    &unit.created_at,
                    &unit.updated_at,
                ),
            )
            .await?;
        Ok(unit)
    }

    /// Active units, most confident first.
    #[instrument(skip(self))]
    pub async fn active_for_contact(&self, contact_id: &str) -> Result<Vec<CognitiveUnit>, Error> {
        self.db
            .query_as(
                r#"
                SELECT * FROM cognitive_unit
                WHERE contact_id = ?1 AND status = 'active'
                ORDER BY confidence_score DESC, updated_at DESC
                "#,
                [contact_id],
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, unit_id: &str, status: UnitStatus) -> Result<(), Error> {
        let changed = self
            .db
            .run(
                "UPDATE cognitive_unit SET status = ?1, updated_at = ?2 WHERE unit_id = ?3",
                (status.as_str(), &now(), unit_id),
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("cognitive unit {unit_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, unit_id: &str) -> Result<bool, Error> {
        let changed = self
            .db
            .run("DELETE FROM cognitive_unit WHERE unit_id = ?1", [unit_id])
            .await?;
        Ok(changed > 0)
    }
}
