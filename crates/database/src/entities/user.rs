//! User entity definitions

use serde::{Deserialize, Serialize};

/// A user account. The identifier is supplied by the external identity
/// collaborator and treated as an opaque stable string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub presence: Presence,
    pub last_seen_at: String,
}

/// Request for registering a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub id: String,
    pub display_name: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("User id cannot be empty".to_string());
        }

        if self.display_name.trim().is_empty() {
            return Err("Display name cannot be empty".to_string());
        }

        if self.display_name.len() > 255 {
            return Err("Display name too long (max 255 characters)".to_string());
        }

        Ok(())
    }
}

/// Online/offline flag tracked by the presence store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Presence::Online)
    }
}

impl From<&str> for Presence {
    fn from(s: &str) -> Self {
        match s {
            "online" => Presence::Online,
            _ => Presence::Offline,
        }
    }
}

impl ToString for Presence {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}
