use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use secure_comms_service::config::Config;
use secure_comms_service::error::AppError;
use secure_comms_service::services::{Directory, PgDirectory};
use secure_comms_service::signaling::{RoomRegistry, SignalingRouter};
use secure_comms_service::state::AppState;
use secure_comms_service::websocket::ConnectionRegistry;
use secure_comms_service::{db, logging, routes};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;

    let registry = ConnectionRegistry::new();
    let signaling = SignalingRouter::new(RoomRegistry::new(), registry.clone());
    let directory: Arc<dyn Directory> = Arc::new(PgDirectory::new(pool.clone()));

    let state = AppState {
        db: pool,
        registry,
        signaling,
        directory,
        config: Arc::new(config.clone()),
    };

    let port = config.port;
    tracing::info!(port, "starting secure comms service");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::health)
            .service(routes::wsroute::ws_handler)
            .service(routes::keys::get_public_key)
            .service(routes::messages::get_messages)
            .service(routes::messages::send_message)
            .service(routes::messages::mark_delivered)
            .service(routes::messages::mark_read)
    })
    .bind(("0.0.0.0", port))
    .map_err(|e| AppError::StartServer(e.to_string()))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(e.to_string()))
}
