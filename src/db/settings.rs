//! Repository for global settings and privilege groups.
//!
//! Settings are opaque JSON values under string keys. Privilege groups form
//! a parent/child graph with a recursive descendant check; the groups exist
//! in the schema and are primed on first run, but handler authorization
//! still rests on the administrator flag and channel ownership.

use super::DbError;
use sqlx::SqlitePool;

/// Tables whose CRUD actions get individual privilege groups.
const CRUD_TABLES: &[&str] = &[
    "MutedUser",
    "ChannelBan",
    "CommunicationChannel",
    "InboxMessage",
    "ChannelMessage",
    "UserContact",
];

const CRUD_ACTIONS: &[&str] = &["create", "read", "update", "delete"];

const COMPOSITE_GROUPS: &[&str] = &[
    "CREATE_ALL",
    "READ_ALL",
    "UPDATE_ALL",
    "DELETE_ALL",
    "FULL_CRUD",
    "USER",
    "ADMINISTRATOR",
    "AdminConsole.open",
    "ChannelAdmin.open",
    "ChannelServer.open",
    "ALL_ADMIN_POWER",
];

/// Repository for settings and privilege operations.
pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch an arbitrary setting value.
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, DbError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM global_setting WHERE \"key\" = ?")
                .bind(key)
                .fetch_optional(self.pool)
                .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Assign an arbitrary setting value.
    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), DbError> {
        sqlx::query("INSERT OR REPLACE INTO global_setting (\"key\", value) VALUES (?, ?)")
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete the requested key; returns false when it was absent.
    pub async fn delete(&self, key: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM global_setting WHERE \"key\" = ?")
            .bind(key)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() != 0)
    }

    /// Convenience accessor for integer settings.
    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>, DbError> {
        Ok(self.get(key).await?.and_then(|v| v.as_i64()))
    }

    /// Populate defaults and the privilege hierarchy on a fresh database.
    pub async fn prime_if_fresh(&self) -> Result<(), DbError> {
        let existing: i64 = sqlx::query_scalar("SELECT count(*) FROM global_setting")
            .fetch_one(self.pool)
            .await?;
        if existing != 0 {
            return Ok(());
        }

        self.set("InsideMenu.mercy_limit", &serde_json::json!(2))
            .await?;
        self.set("Application.name", &serde_json::json!("Confabulator"))
            .await?;

        for table in CRUD_TABLES {
            for action in CRUD_ACTIONS {
                self.group_create(&format!("{table}.{action}")).await?;
            }
        }
        for group in COMPOSITE_GROUPS {
            self.group_create(group).await?;
        }

        for table in CRUD_TABLES {
            for action in CRUD_ACTIONS {
                let composite = format!("{}_ALL", action.to_uppercase());
                self.relationship_create(&format!("{table}.{action}"), &composite)
                    .await?;
            }
        }
        for composite in ["CREATE_ALL", "READ_ALL", "UPDATE_ALL", "DELETE_ALL"] {
            self.relationship_create(composite, "FULL_CRUD").await?;
        }
        self.relationship_create("FULL_CRUD", "USER").await?;
        self.relationship_create("FULL_CRUD", "ADMINISTRATOR").await?;
        for console in ["AdminConsole.open", "ChannelAdmin.open", "ChannelServer.open"] {
            self.relationship_create(console, "ALL_ADMIN_POWER").await?;
        }
        self.relationship_create("ALL_ADMIN_POWER", "ADMINISTRATOR")
            .await?;
        Ok(())
    }

    /// Create a privilege group if it does not exist.
    pub async fn group_create(&self, name: &str) -> Result<(), DbError> {
        sqlx::query("INSERT OR IGNORE INTO privilege_group (name) VALUES (?)")
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a privilege group not referenced by a relationship.
    pub async fn group_delete(&self, name: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM privilege_group WHERE name = ?")
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record that `parent` grants everything `child` grants.
    pub async fn relationship_create(&self, parent: &str, child: &str) -> Result<(), DbError> {
        sqlx::query(
            "INSERT OR IGNORE INTO privilege_relationship (parent_id, child_id) VALUES ( \
                (SELECT privilege_group_id FROM privilege_group WHERE name = ?), \
                (SELECT privilege_group_id FROM privilege_group WHERE name = ?))",
        )
        .bind(parent)
        .bind(child)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn relationship_delete(&self, parent: &str, child: &str) -> Result<(), DbError> {
        sqlx::query(
            "DELETE FROM privilege_relationship \
             WHERE parent_id = (SELECT privilege_group_id FROM privilege_group WHERE name = ?) \
               AND child_id = (SELECT privilege_group_id FROM privilege_group WHERE name = ?)",
        )
        .bind(parent)
        .bind(child)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Walk the relationship graph upward from `child` and report whether
    /// `parent` is among its ancestors.
    pub async fn child_has_parent(&self, child: &str, parent: &str) -> Result<bool, DbError> {
        let found: Option<i64> = sqlx::query_scalar(
            "WITH RECURSIVE parent_of_child (id) AS ( \
                SELECT privilege_group_id FROM privilege_group WHERE name = ? \
                UNION \
                SELECT parent_id FROM privilege_relationship \
                JOIN parent_of_child ON id = child_id) \
             SELECT id FROM parent_of_child \
             WHERE id = (SELECT privilege_group_id FROM privilege_group WHERE name = ?)",
        )
        .bind(child)
        .bind(parent)
        .fetch_optional(self.pool)
        .await?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn priming_sets_defaults_once() {
        let db = Database::new(":memory:").await.unwrap();
        assert_eq!(
            db.settings()
                .get_i64("InsideMenu.mercy_limit")
                .await
                .unwrap(),
            Some(2)
        );
        let name = db.settings().get("Application.name").await.unwrap().unwrap();
        assert_eq!(name.as_str(), Some("Confabulator"));

        // a second prime pass must not reset changed values
        db.settings()
            .set("InsideMenu.mercy_limit", &serde_json::json!(5))
            .await
            .unwrap();
        db.settings().prime_if_fresh().await.unwrap();
        assert_eq!(
            db.settings()
                .get_i64("InsideMenu.mercy_limit")
                .await
                .unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn delete_targets_the_requested_key() {
        let db = Database::new(":memory:").await.unwrap();
        let settings = db.settings();
        settings.set("keep", &serde_json::json!("kept")).await.unwrap();
        settings.set("drop", &serde_json::json!("dropped")).await.unwrap();
        assert!(settings.delete("drop").await.unwrap());
        assert!(!settings.delete("drop").await.unwrap());
        assert!(settings.get("drop").await.unwrap().is_none());
        assert_eq!(
            settings.get("keep").await.unwrap().unwrap().as_str(),
            Some("kept")
        );
    }

    #[tokio::test]
    async fn privilege_hierarchy_is_transitive() {
        let db = Database::new(":memory:").await.unwrap();
        let settings = db.settings();
        assert!(
            settings
                .child_has_parent("ADMINISTRATOR", "MutedUser.create")
                .await
                .unwrap()
        );
        assert!(
            settings
                .child_has_parent("ADMINISTRATOR", "AdminConsole.open")
                .await
                .unwrap()
        );
        assert!(
            settings
                .child_has_parent("USER", "UserContact.delete")
                .await
                .unwrap()
        );
        assert!(
            !settings
                .child_has_parent("USER", "AdminConsole.open")
                .await
                .unwrap()
        );
    }
}
