use crate::config::Config;
use crate::services::directory::Directory;
use crate::signaling::SignalingRouter;
use crate::websocket::ConnectionRegistry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub registry: ConnectionRegistry,
    pub signaling: SignalingRouter,
    pub directory: Arc<dyn Directory>,
    pub config: Arc<Config>,
}
