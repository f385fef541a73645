//! REST endpoints for the gateway

pub mod messages;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/users", post(users::register_user).get(users::list_users))
        .route("/api/users/online", get(users::list_online_users))
        .route("/api/users/:id/connect", post(users::connect_user))
        .route("/api/users/:id/disconnect", post(users::disconnect_user))
        .route("/api/messages", post(messages::send_message))
        .route("/api/messages/read", post(messages::mark_messages_read))
        .route("/api/messages/delivered/:id", post(messages::mark_message_delivered))
        .route(
            "/api/messages/:sender/:recipient",
            get(messages::get_chat_messages),
        )
        .route(
            "/api/messages/:sender/:recipient/count",
            get(messages::count_unread_messages),
        )
}
