//! Repository for the account table, contacts and inboxes.
//!
//! Accounts persist as a whole on clean shutdown and load as a whole on
//! startup, so the repository trades in [`AccountRecord`] snapshots.

use super::DbError;
use crate::state::{AccountRecord, MessageRecord};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Repository for account persistence.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every account with its contacts and inbox, in creation order.
    pub async fn load_all(&self) -> Result<Vec<AccountRecord>, DbError> {
        let rows: Vec<(i64, String, String, bool, i64)> = sqlx::query_as(
            "SELECT user_account_id, name, password, administrator, forgiven \
             FROM user_account ORDER BY user_account_id",
        )
        .fetch_all(self.pool)
        .await?;

        let mut records: BTreeMap<i64, AccountRecord> = rows
            .into_iter()
            .map(|(id, name, password, administrator, forgiven)| {
                (
                    id,
                    AccountRecord {
                        name,
                        password,
                        administrator,
                        forgiven,
                        contacts: Vec::new(),
                        messages: Vec::new(),
                    },
                )
            })
            .collect();

        let contacts: Vec<(i64, String)> = sqlx::query_as(
            "SELECT owner_id, friend_name FROM user_contact ORDER BY owner_id, position",
        )
        .fetch_all(self.pool)
        .await?;
        for (owner_id, friend) in contacts {
            if let Some(record) = records.get_mut(&owner_id) {
                record.contacts.push(friend);
            }
        }

        let messages: Vec<(i64, String, String, bool, i64)> = sqlx::query_as(
            "SELECT owner_id, source, body, unread, sent_at \
             FROM inbox_message ORDER BY owner_id, inbox_message_id",
        )
        .fetch_all(self.pool)
        .await?;
        for (owner_id, source, body, unread, sent_at) in messages {
            if let Some(record) = records.get_mut(&owner_id) {
                record.messages.push(MessageRecord {
                    source,
                    body,
                    unread,
                    sent_at,
                });
            }
        }

        Ok(records.into_values().collect())
    }

    /// Replace the persisted account table with the given snapshots.
    pub async fn save_all(&self, records: &[AccountRecord]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM inbox_message")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_contact")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_account")
            .execute(&mut *tx)
            .await?;

        let now = chrono::Utc::now().timestamp();
        for record in records {
            let result = sqlx::query(
                "INSERT INTO user_account (name, password, administrator, forgiven, registered_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.name)
            .bind(&record.password)
            .bind(record.administrator)
            .bind(record.forgiven)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            let owner_id = result.last_insert_rowid();

            for (position, friend) in record.contacts.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO user_contact (owner_id, friend_name, position) VALUES (?, ?, ?)",
                )
                .bind(owner_id)
                .bind(friend)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }

            for message in &record.messages {
                sqlx::query(
                    "INSERT INTO inbox_message (owner_id, source, body, unread, sent_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(owner_id)
                .bind(&message.source)
                .bind(&message.body)
                .bind(message.unread)
                .bind(message.sent_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::state::{AccountRecord, MessageRecord};

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let db = Database::new(":memory:").await.unwrap();
        let records = vec![
            AccountRecord {
                name: "alice".to_string(),
                password: "pw".to_string(),
                administrator: true,
                forgiven: 0,
                contacts: vec!["bob".to_string(), "carol".to_string()],
                messages: vec![MessageRecord {
                    source: "bob".to_string(),
                    body: "hello\n\nthere".to_string(),
                    unread: true,
                    sent_at: 1700000000,
                }],
            },
            AccountRecord {
                name: "bob".to_string(),
                password: "hunter2".to_string(),
                administrator: false,
                forgiven: 1,
                contacts: vec![],
                messages: vec![],
            },
        ];
        db.accounts().save_all(&records).await.unwrap();

        let loaded = db.accounts().load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "alice");
        assert!(loaded[0].administrator);
        assert_eq!(loaded[0].contacts, vec!["bob", "carol"]);
        assert_eq!(loaded[0].messages.len(), 1);
        assert_eq!(loaded[0].messages[0].body, "hello\n\nthere");
        assert!(loaded[0].messages[0].unread);
        assert_eq!(loaded[1].name, "bob");
        assert_eq!(loaded[1].forgiven, 1);

        // saving again replaces, never appends
        db.accounts().save_all(&loaded).await.unwrap();
        assert_eq!(db.accounts().load_all().await.unwrap().len(), 2);
    }
}
