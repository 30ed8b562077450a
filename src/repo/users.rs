//! Local user profile.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{now, Patch};
use crate::db::Database;
use crate::error::Error;

const UPDATABLE: &[&str] = &["name", "contact_info", "birthday", "notes"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub contact_info: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Settings-page edits. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
}

impl UserUpdate {
    pub fn into_patch(self) -> Patch {
        Patch::new()
            .maybe("name", self.name)
            .maybe("contact_info", self.contact_info)
            .maybe("birthday", self.birthday)
            .maybe("notes", self.notes)
    }
}

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> Result<Option<User>, Error> {
        self.db
            .query_one("SELECT * FROM user WHERE user_id = ?1", [user_id])
            .await
    }

    /// Insert the profile unless it already exists. Returns whether a row
    /// was created; an existing profile is never overwritten.
    #[instrument(skip(self))]
    pub async fn ensure(&self, user_id: &str, name: &str) -> Result<bool, Error> {
        let now = now();
        let inserted = self
            .db
            .run(
                "INSERT OR IGNORE INTO user (user_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                (user_id, name, &now),
            )
            .await?;
        Ok(inserted > 0)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, user_id: &str, update: UserUpdate) -> Result<(), Error> {
        let Some(stmt) =
            update
                .into_patch()
                .to_update("user", "user_id", user_id, UPDATABLE, Some("updated_at"))?
        else {
            return Ok(());
        };
        let changed = self
            .db
            .run(&stmt.sql, rusqlite::params_from_iter(stmt.params.iter()))
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Remove a profile and, through cascading keys, everything it owns.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str) -> Result<bool, Error> {
        let changed = self
            .db
            .run("DELETE FROM user WHERE user_id = ?1", [user_id])
            .await?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SeedProfile;

    async fn test_repo() -> UserRepo {
        let db = Database::open_memory();
        db.initialize(&SeedProfile::default()).await.unwrap();
        UserRepo::new(db)
    }

    #[tokio::test]
    async fn test_seeded_profile() {
        let repo = test_repo().await;
        let user = repo.get("u_local").await.unwrap().unwrap();
        assert_eq!(user.name, "Me");
        assert!(user.notes.is_none());
    }

    #[tokio::test]
    async fn test_ensure_never_overwrites() {
        let repo = test_repo().await;
        assert!(!repo.ensure("u_local", "Someone Else").await.unwrap());
        assert_eq!(repo.get("u_local").await.unwrap().unwrap().name, "Me");
        assert!(repo.ensure("u_other", "Other").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_only_present_fields() {
        let repo = test_repo().await;
        repo.update(
            "u_local",
            UserUpdate {
                notes: Some("early riser".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let user = repo.get("u_local").await.unwrap().unwrap();
        assert_eq!(user.name, "Me");
        assert_eq!(user.notes.as_deref(), Some("early riser"));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = test_repo().await;
        let err = repo
            .update(
                "nobody",
                UserUpdate {
                    name: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
