//! Repository for user and presence data access operations.

use crate::entities::{Presence, RegisterUserRequest, User};
use crate::types::{UserError, UserResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for user database operations. Doubles as the presence store:
/// each presence transition is a single-row update of status plus last-seen.
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user, refreshing the display name if the id already exists.
    /// A fresh row starts offline.
    pub async fn register(&self, request: &RegisterUserRequest) -> UserResult<User> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, display_name, presence, last_seen_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(&request.id)
        .bind(&request.display_name)
        .bind(Presence::Offline.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        info!(user_id = %request.id, "registered user");

        self.find_by_id(&request.id)
            .await?
            .ok_or(UserError::UserNotFound)
    }

    /// Find a user by id
    pub async fn find_by_id(&self, user_id: &str) -> UserResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, display_name, presence, last_seen_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(|row| map_user(&row)).transpose()
    }

    /// Update a user's presence and last-seen time in a single statement.
    /// Returns the number of affected rows; an unknown id affects none.
    pub async fn set_presence(&self, user_id: &str, presence: Presence) -> UserResult<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query("UPDATE users SET presence = ?, last_seen_at = ? WHERE id = ?")
            .bind(presence.to_string())
            .bind(&now)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Whether the user is currently online. Unknown users are treated as
    /// offline, never as an error.
    pub async fn is_online(&self, user_id: &str) -> UserResult<bool> {
        let row = sqlx::query("SELECT presence FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        let online = match row {
            Some(row) => {
                let presence: String = row
                    .try_get("presence")
                    .map_err(|e| UserError::DatabaseError(e.to_string()))?;
                Presence::from(presence.as_str()).is_online()
            }
            None => false,
        };

        Ok(online)
    }

    /// List currently-online users
    pub async fn find_online(&self) -> UserResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, display_name, presence, last_seen_at FROM users
             WHERE presence = ? ORDER BY display_name ASC",
        )
        .bind(Presence::Online.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        rows.iter().map(map_user).collect()
    }

    /// List all registered users
    pub async fn find_all(&self) -> UserResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, display_name, presence, last_seen_at FROM users
             ORDER BY display_name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        rows.iter().map(map_user).collect()
    }
}

fn map_user(row: &sqlx::sqlite::SqliteRow) -> UserResult<User> {
    let presence: String = row
        .try_get("presence")
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

    Ok(User {
        id: row
            .try_get("id")
            .map_err(|e| UserError::DatabaseError(e.to_string()))?,
        display_name: row
            .try_get("display_name")
            .map_err(|e| UserError::DatabaseError(e.to_string()))?,
        presence: Presence::from(presence.as_str()),
        last_seen_at: row
            .try_get("last_seen_at")
            .map_err(|e| UserError::DatabaseError(e.to_string()))?,
    })
}
