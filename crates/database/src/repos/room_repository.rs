//! Repository for room identity resolution.

use crate::entities::pair_key;
use crate::types::{MessagingError, MessagingResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for the room table. A room is one record per unordered pair
/// of users, keyed by the canonicalized pair key.
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    /// Create a new room repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the room id for a pair of users. Read-only: an absent room
    /// yields `None`, never an error and never a new record.
    pub async fn find_by_pair(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> MessagingResult<Option<String>> {
        let key = pair_key(user_a, user_b);

        let row = sqlx::query("SELECT public_id FROM rooms WHERE pair_key = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        row.map(|row| {
            row.try_get("public_id")
                .map_err(|e| MessagingError::DatabaseError(e.to_string()))
        })
        .transpose()
    }

    /// Return the room id for a pair of users, creating the room if it does
    /// not exist yet. The UNIQUE constraint on the pair key makes concurrent
    /// creation converge: the losing insert is a no-op and the follow-up
    /// select observes the winner's id.
    pub async fn create_for_pair(&self, user_a: &str, user_b: &str) -> MessagingResult<String> {
        let key = pair_key(user_a, user_b);
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let (low, high) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };

        let result = sqlx::query(
            "INSERT INTO rooms (public_id, pair_key, user_low, user_high, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(pair_key) DO NOTHING",
        )
        .bind(&public_id)
        .bind(&key)
        .bind(low)
        .bind(high)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 1 {
            info!(room_id = %public_id, pair_key = %key, "created room");
            return Ok(public_id);
        }

        self.find_by_pair(user_a, user_b)
            .await?
            .ok_or(MessagingError::RoomNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_rooms.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await
            .unwrap();

        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                public_id TEXT NOT NULL UNIQUE,
                pair_key TEXT NOT NULL UNIQUE,
                user_low TEXT NOT NULL,
                user_high TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_create_is_pair_order_independent() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = RoomRepository::new(pool);

        let id_ab = repo.create_for_pair("alice", "bob").await.unwrap();
        let id_ba = repo.create_for_pair("bob", "alice").await.unwrap();

        assert_eq!(id_ab, id_ba);
    }

    #[tokio::test]
    async fn test_find_without_create_yields_none() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = RoomRepository::new(pool);

        assert!(repo.find_by_pair("alice", "bob").await.unwrap().is_none());

        let created = repo.create_for_pair("alice", "bob").await.unwrap();
        let found = repo.find_by_pair("bob", "alice").await.unwrap();

        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_distinct_pairs_get_distinct_rooms() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = RoomRepository::new(pool);

        let ab = repo.create_for_pair("alice", "bob").await.unwrap();
        let ac = repo.create_for_pair("alice", "carol").await.unwrap();

        assert_ne!(ab, ac);
    }

    #[tokio::test]
    async fn test_concurrent_create_converges() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo_a = RoomRepository::new(pool.clone());
        let repo_b = RoomRepository::new(pool);

        let task_a = tokio::spawn(async move { repo_a.create_for_pair("alice", "bob").await });
        let task_b = tokio::spawn(async move { repo_b.create_for_pair("bob", "alice").await });

        let id_a = task_a.await.unwrap().unwrap();
        let id_b = task_b.await.unwrap().unwrap();

        assert_eq!(id_a, id_b);
    }
}
