//! Courier Messaging Crate
//!
//! The message lifecycle service: room resolution, presence-driven initial
//! status assignment, and the Sent -> Delivered -> Read state machine with
//! query-time filtering. Persistence always completes before the matching
//! event is published.

pub mod service;

pub use service::{
    BulkDeliveryReport, DeliveryFailure, MessageService, SendMessageRequest,
};
