//! Courier Presence Crate
//!
//! The presence store behind an explicit service interface: connect and
//! disconnect events mutate a single user row, `is_online` is a
//! point-in-time read, and every completed transition is broadcast on the
//! global presence topic. Fanout failure never reaches the caller.

use courier_database::{Presence, RegisterUserRequest, User, UserError, UserRepository, UserResult};
use courier_fanout::{Event, EventBus, Topic};
use sqlx::SqlitePool;
use tracing::debug;

/// Service for presence tracking and the user directory
pub struct PresenceService {
    users: UserRepository,
    events: EventBus,
}

impl PresenceService {
    /// Create a new presence service instance
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self {
            users: UserRepository::new(pool),
            events,
        }
    }

    /// Register a user supplied by the external identity collaborator
    pub async fn register(&self, request: RegisterUserRequest) -> UserResult<User> {
        if let Err(e) = request.validate() {
            return Err(UserError::ValidationError(e));
        }

        self.users.register(&request).await
    }

    /// Mark a user online. Delivered exactly once per transition by the
    /// live-connection layer.
    pub async fn connect(&self, user_id: &str) -> UserResult<()> {
        self.transition(user_id, Presence::Online).await
    }

    /// Mark a user offline
    pub async fn disconnect(&self, user_id: &str) -> UserResult<()> {
        self.transition(user_id, Presence::Offline).await
    }

    async fn transition(&self, user_id: &str, presence: Presence) -> UserResult<()> {
        let affected = self.users.set_presence(user_id, presence).await?;

        if affected == 0 {
            debug!(user_id, "presence transition for unknown user ignored");
            return Ok(());
        }

        // Publish only after the row update has completed, so a client that
        // queries on notification receipt observes the new state.
        if let Some(user) = self.users.find_by_id(user_id).await? {
            self.events.publish(
                Topic::Presence,
                Event::PresenceChanged {
                    user_id: user.id,
                    presence: user.presence,
                    last_seen_at: user.last_seen_at,
                },
            );
        }

        Ok(())
    }

    /// Whether the user is currently online. Unknown users read as offline.
    pub async fn is_online(&self, user_id: &str) -> UserResult<bool> {
        self.users.is_online(user_id).await
    }

    /// Find a user by id
    pub async fn find_user(&self, user_id: &str) -> UserResult<Option<User>> {
        self.users.find_by_id(user_id).await
    }

    /// List currently-online users
    pub async fn online_users(&self) -> UserResult<Vec<User>> {
        self.users.find_online().await
    }

    /// List all registered users
    pub async fn all_users(&self) -> UserResult<Vec<User>> {
        self.users.find_all().await
    }
}
