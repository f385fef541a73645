//! Repository implementations for data access

pub mod message_repository;
pub mod room_repository;
pub mod user_repository;

pub use message_repository::MessageRepository;
pub use room_repository::RoomRepository;
pub use user_repository::UserRepository;
