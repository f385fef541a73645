//! User and presence REST endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use courier_database::{RegisterUserRequest, User};

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct RegisterUserBody {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub display_name: String,
    pub presence: String,
    pub last_seen_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            presence: user.presence.to_string(),
            last_seen_at: user.last_seen_at,
        }
    }
}

/// Register a user supplied by the external identity collaborator
pub async fn register_user(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<RegisterUserBody>,
) -> GatewayResult<Json<UserResponse>> {
    let user = state
        .presence_service
        .register(RegisterUserRequest {
            id: body.id,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(user.into()))
}

/// List all registered users
pub async fn list_users(
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Vec<UserResponse>>> {
    let users = state.presence_service.all_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// List currently-online users
pub async fn list_online_users(
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Vec<UserResponse>>> {
    let users = state.presence_service.online_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Presence signal: mark a user online
pub async fn connect_user(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
) -> GatewayResult<()> {
    state.presence_service.connect(&user_id).await?;
    Ok(())
}

/// Presence signal: mark a user offline
pub async fn disconnect_user(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
) -> GatewayResult<()> {
    state.presence_service.disconnect(&user_id).await?;
    Ok(())
}
