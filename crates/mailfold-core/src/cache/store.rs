//! Snapshot storage.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use super::snapshot::trim;
use crate::Result;
use crate::sync::MessageSummary;

/// Namespace key for `user`'s cached messages.
#[must_use]
pub fn namespace_for(user: &str) -> String {
    format!("mailfold_cached_messages_{user}")
}

/// `SQLite`-backed store for bounded message snapshots.
#[derive(Debug, Clone)]
pub struct LocalCache {
    pool: SqlitePool,
    namespace: String,
    capacity: usize,
}

impl LocalCache {
    /// Opens the cache at `database_path` for `namespace`.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str, namespace: impl Into<String>, capacity: usize) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let cache = Self {
            pool,
            namespace: namespace.into(),
            capacity,
        };
        cache.initialize().await?;
        Ok(cache)
    }

    /// Create an in-memory cache for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(namespace: impl Into<String>, capacity: usize) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let cache = Self {
            pool,
            namespace: namespace.into(),
            capacity,
        };
        cache.initialize().await?;
        Ok(cache)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cache_snapshots (
                namespace TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Namespace this cache reads and writes.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Loads the snapshot. Missing or unreadable snapshots yield an empty list.
    pub async fn load(&self) -> Vec<MessageSummary> {
        match self.try_load().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "cache unreadable, starting empty");
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<MessageSummary>> {
        let row = sqlx::query("SELECT payload FROM cache_snapshots WHERE namespace = ?")
            .bind(&self.namespace)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(namespace = %self.namespace, "no cached snapshot");
            return Ok(Vec::new());
        };
        let payload: String = row.try_get("payload")?;
        Ok(serde_json::from_str(&payload)?)
    }

    /// Trims `messages` to the cap and replaces the stored snapshot.
    ///
    /// Returns the number of messages written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database write fails.
    pub async fn save(&self, messages: &[MessageSummary]) -> Result<usize> {
        let snapshot = trim(messages, self.capacity);
        let payload = serde_json::to_string(&snapshot)?;

        sqlx::query(
            r"
            INSERT INTO cache_snapshots (namespace, payload, saved_at)
            VALUES (?, ?, ?)
            ON CONFLICT(namespace) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
            ",
        )
        .bind(&self.namespace)
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(namespace = %self.namespace, count = snapshot.len(), "cache saved");
        Ok(snapshot.len())
    }

    #[cfg(test)]
    async fn write_raw(&self, payload: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO cache_snapshots (namespace, payload, saved_at) VALUES (?, ?, '')")
            .bind(&self.namespace)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::account::AccountId;
    use crate::sync::MessageDate;

    fn message(remote_id: u32, seen: bool) -> MessageSummary {
        let mut flags = BTreeSet::new();
        if seen {
            flags.insert("\\Seen".to_string());
        }
        MessageSummary {
            remote_id,
            account_id: AccountId::new("a"),
            subject: format!("s{remote_id}"),
            sender: "x@example.com".into(),
            date: MessageDate::Unparseable,
            flags,
        }
    }

    #[test]
    fn test_namespace() {
        assert_eq!(namespace_for("ada"), "mailfold_cached_messages_ada");
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let cache = LocalCache::in_memory("ns", 500).await.unwrap();
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let cache = LocalCache::in_memory("ns", 500).await.unwrap();
        let written = cache.save(&[message(1, true), message(2, false)]).await.unwrap();
        assert_eq!(written, 2);

        let loaded = cache.load().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].remote_id, 2);
    }

    #[tokio::test]
    async fn test_save_replaces_and_trims() {
        let cache = LocalCache::in_memory("ns", 2).await.unwrap();
        cache
            .save(&[message(1, true), message(2, true), message(3, false)])
            .await
            .unwrap();
        let loaded = cache.load().await;
        assert_eq!(loaded.len(), 2);
        assert!(!loaded[0].is_seen());

        cache.save(&[]).await.unwrap();
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_empty() {
        let cache = LocalCache::in_memory("ns", 500).await.unwrap();
        cache.write_raw("{not json").await.unwrap();
        assert!(cache.load().await.is_empty());
    }
}
