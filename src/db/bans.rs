//! Repository for the connect-time IP ban list.
//!
//! Unlike accounts and channels, bans are written through immediately so
//! a crash never loses one.

use super::DbError;
use sqlx::SqlitePool;

/// Repository for ban-list operations.
pub struct BanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Membership check used by the connect-time ban filter.
    pub async fn contains(&self, address: &str) -> Result<bool, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM blocked_client WHERE ip_address = ?")
                .bind(address)
                .fetch_one(self.pool)
                .await?;
        Ok(count != 0)
    }

    /// Add an address; returns false when it was already listed.
    pub async fn add(&self, address: &str) -> Result<bool, DbError> {
        let result = sqlx::query("INSERT OR IGNORE INTO blocked_client (ip_address) VALUES (?)")
            .bind(address)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove an address; returns false when it was not listed.
    pub async fn remove(&self, address: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM blocked_client WHERE ip_address = ?")
            .bind(address)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() != 0)
    }

    /// Every banned address in insertion order.
    pub async fn list(&self) -> Result<Vec<String>, DbError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT ip_address FROM blocked_client ORDER BY blocked_client_id")
                .fetch_all(self.pool)
                .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn add_remove_list() {
        let db = Database::new(":memory:").await.unwrap();
        let bans = db.bans();
        assert!(bans.add("192.168.0.1").await.unwrap());
        assert!(!bans.add("192.168.0.1").await.unwrap());
        assert!(bans.add("10.0.0.7").await.unwrap());
        assert_eq!(
            bans.list().await.unwrap(),
            vec!["192.168.0.1".to_string(), "10.0.0.7".to_string()]
        );
        assert!(bans.contains("192.168.0.1").await.unwrap());
        assert!(bans.remove("192.168.0.1").await.unwrap());
        assert!(!bans.remove("192.168.0.1").await.unwrap());
        assert!(!bans.contains("192.168.0.1").await.unwrap());
    }
}
