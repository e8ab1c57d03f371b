//! Repository for the channel registry and room state.
//!
//! Rooms persist everything except their transient fields: the connected
//! map, kick marks and the admin gate never touch the store. A deleted
//! room keeps its row (with a NULL name) so its history survives.

use super::DbError;
use crate::state::{ChannelLine, RoomPhase, RoomSnapshot};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Repository for channel persistence.
pub struct ChannelRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChannelRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every room snapshot, keyed by stable channel id.
    pub async fn load_all(&self) -> Result<Vec<RoomSnapshot>, DbError> {
        let rows: Vec<(i64, Option<String>, String, String, Option<i64>, Option<i64>, String)> =
            sqlx::query_as(
                "SELECT channel_id, name, owner, password, buffer_size, replay_size, phase \
                 FROM communication_channel ORDER BY channel_id",
            )
            .fetch_all(self.pool)
            .await?;

        let mut snapshots: BTreeMap<i64, RoomSnapshot> = rows
            .into_iter()
            .map(|(id, name, owner, password, buffer_size, replay_size, phase)| {
                (
                    id,
                    RoomSnapshot {
                        id,
                        name,
                        owner,
                        password,
                        buffer_size: buffer_size.map(|s| s as usize),
                        replay_size: replay_size.map(|s| s as usize),
                        phase: RoomPhase::parse(&phase).unwrap_or(RoomPhase::Ready),
                        buffer: Vec::new(),
                        banned: Vec::new(),
                        mutes: Vec::new(),
                    },
                )
            })
            .collect();

        let lines: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT channel_id, source, body FROM channel_message ORDER BY channel_id, position",
        )
        .fetch_all(self.pool)
        .await?;
        for (channel_id, source, body) in lines {
            if let Some(snapshot) = snapshots.get_mut(&channel_id) {
                snapshot.buffer.push(ChannelLine::new(source, body));
            }
        }

        let bans: Vec<(i64, String)> = sqlx::query_as(
            "SELECT channel_id, name FROM channel_ban ORDER BY channel_id, channel_ban_id",
        )
        .fetch_all(self.pool)
        .await?;
        for (channel_id, name) in bans {
            if let Some(snapshot) = snapshots.get_mut(&channel_id) {
                snapshot.banned.push(name);
            }
        }

        let mutes: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT channel_id, muted_name, muter_name FROM muted_user \
             ORDER BY channel_id, muted_user_id",
        )
        .fetch_all(self.pool)
        .await?;
        for (channel_id, muted, muter) in mutes {
            if let Some(snapshot) = snapshots.get_mut(&channel_id) {
                snapshot.mutes.push((muted, muter));
            }
        }

        Ok(snapshots.into_values().collect())
    }

    /// Replace the persisted channel registry with the given snapshots.
    pub async fn save_all(&self, snapshots: &[RoomSnapshot]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM channel_message")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM channel_ban")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM muted_user")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM communication_channel")
            .execute(&mut *tx)
            .await?;

        for snapshot in snapshots {
            sqlx::query(
                "INSERT INTO communication_channel \
                 (channel_id, name, owner, password, buffer_size, replay_size, phase) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(snapshot.id)
            .bind(&snapshot.name)
            .bind(&snapshot.owner)
            .bind(&snapshot.password)
            .bind(snapshot.buffer_size.map(|s| s as i64))
            .bind(snapshot.replay_size.map(|s| s as i64))
            .bind(snapshot.phase.as_str())
            .execute(&mut *tx)
            .await?;

            for (position, line) in snapshot.buffer.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO channel_message (channel_id, position, source, body) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(snapshot.id)
                .bind(position as i64)
                .bind(&line.source)
                .bind(&line.body)
                .execute(&mut *tx)
                .await?;
            }

            for name in &snapshot.banned {
                sqlx::query("INSERT INTO channel_ban (channel_id, name) VALUES (?, ?)")
                    .bind(snapshot.id)
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
            }

            for (muted, muter) in &snapshot.mutes {
                sqlx::query(
                    "INSERT INTO muted_user (channel_id, muted_name, muter_name) VALUES (?, ?, ?)",
                )
                .bind(snapshot.id)
                .bind(muted)
                .bind(muter)
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
    use crate::state::{ChannelLine, RoomPhase, RoomSnapshot};

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let db = Database::new(":memory:").await.unwrap();
        let snapshots = vec![
            RoomSnapshot {
                id: 1,
                name: Some("lounge".to_string()),
                owner: "alice".to_string(),
                password: "sesame".to_string(),
                buffer_size: Some(100),
                replay_size: None,
                phase: RoomPhase::Ready,
                buffer: vec![
                    ChannelLine::new("alice", "first"),
                    ChannelLine::new("bob", "second"),
                ],
                banned: vec!["mallory".to_string()],
                mutes: vec![("bob".to_string(), "alice".to_string())],
            },
            RoomSnapshot {
                id: 2,
                name: None,
                owner: "bob".to_string(),
                password: String::new(),
                buffer_size: None,
                replay_size: Some(0),
                phase: RoomPhase::Final,
                buffer: vec![],
                banned: vec![],
                mutes: vec![],
            },
        ];
        db.channels().save_all(&snapshots).await.unwrap();

        let loaded = db.channels().load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name.as_deref(), Some("lounge"));
        assert_eq!(loaded[0].buffer.len(), 2);
        assert_eq!(loaded[0].buffer[1].body, "second");
        assert_eq!(loaded[0].buffer_size, Some(100));
        assert_eq!(loaded[0].replay_size, None);
        assert_eq!(loaded[0].banned, vec!["mallory".to_string()]);
        assert_eq!(
            loaded[0].mutes,
            vec![("bob".to_string(), "alice".to_string())]
        );
        assert_eq!(loaded[1].name, None);
        assert_eq!(loaded[1].phase, RoomPhase::Final);
        assert_eq!(loaded[1].replay_size, Some(0));
    }
}
