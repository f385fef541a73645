//! Entity definitions for the courier database

pub mod message;
pub mod room;
pub mod user;

pub use message::{ChatMessage, MediaMetadata, MessageKind, MessageStatus, NewMessage};
pub use room::{pair_key, Room};
pub use user::{Presence, RegisterUserRequest, User};
