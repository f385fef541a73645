//! Shared application state for the gateway

use std::sync::Arc;

use courier_config::DatabaseConfig;
use courier_fanout::EventBus;
use courier_messaging::MessageService;
use courier_presence::PresenceService;
use sqlx::SqlitePool;

use crate::error::{GatewayError, GatewayResult};

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Fanout bus feeding the live connections
    pub event_bus: EventBus,
    /// Presence service
    pub presence_service: Arc<PresenceService>,
    /// Message lifecycle service
    pub message_service: Arc<MessageService>,
}

impl GatewayState {
    /// Create a new gateway state with all services initialized
    pub fn new(pool: SqlitePool, event_bus: EventBus) -> Self {
        let presence_service = Arc::new(PresenceService::new(pool.clone(), event_bus.clone()));
        let message_service = Arc::new(MessageService::new(
            pool.clone(),
            presence_service.clone(),
            event_bus.clone(),
        ));

        Self {
            pool,
            event_bus,
            presence_service,
            message_service,
        }
    }

    /// Create gateway state from database configuration
    pub async fn from_config(config: &DatabaseConfig, event_bus: EventBus) -> GatewayResult<Self> {
        let pool = courier_database::initialize_database(config)
            .await
            .map_err(|e| {
                GatewayError::InternalError(format!("failed to initialize database: {e}"))
            })?;

        Ok(Self::new(pool, event_bus))
    }
}
