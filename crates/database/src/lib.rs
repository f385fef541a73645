//! Courier Database Crate
//!
//! This crate provides database functionality for the Courier messaging
//! backend, including connection management, migrations, and repository
//! implementations for users, rooms, and messages.

use sqlx::SqlitePool;

use courier_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::run_migrations;

// Re-export repositories
pub use repos::{MessageRepository, RoomRepository, UserRepository};

// Re-export entities
pub use entities::{
    message::{ChatMessage, MediaMetadata, MessageKind, MessageStatus, NewMessage},
    room::{pair_key, Room},
    user::{Presence, RegisterUserRequest, User},
};

// Re-export types
pub use types::{
    errors::{DatabaseError, MessagingError, UserError},
    DatabaseResult, MessagingResult, UserResult,
};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let config = DatabaseConfig {
            url: db_url,
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();

        // The migrated schema should accept a user row
        let repo = UserRepository::new(pool);
        repo.register(&RegisterUserRequest {
            id: "alice".to_string(),
            display_name: "Alice".to_string(),
        })
        .await
        .unwrap();
    }
}
