use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use pharmacy_dispatch_engine::{EmergencyOrderApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        CancelEmergencyOrderRoute,
        CreateEmergencyOrderRoute,
        EmergencyOrderByIdRoute,
        FulfillEmergencyOrderRoute,
        MyEmergencyOrdersRoute,
        PharmacyEmergencyOrdersRoute,
        RespondToEmergencyOrderRoute,
    },
    timeout_sweeper::start_timeout_sweeper,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = connect_database(&config).await?;
    if config.run_sweeper {
        let _sweeper = start_timeout_sweeper(db.clone(), config.dispatch_policy(), config.sweep_interval);
    }
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Opens the database and brings its schema up to date.
pub async fn connect_database(config: &ServerConfig) -> Result<SqliteDatabase, ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open {}. {e}", config.database_url)))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    debug!("🗃️ Connected to {}", db.url());
    Ok(db)
}

/// Malformed JSON bodies are reported with the same error shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    let policy = config.dispatch_policy();
    let srv = HttpServer::new(move || {
        let orders_api = EmergencyOrderApi::new(db.clone(), policy);
        let api_scope = web::scope("/api")
            .service(CreateEmergencyOrderRoute::<SqliteDatabase>::new())
            .service(EmergencyOrderByIdRoute::<SqliteDatabase>::new())
            .service(RespondToEmergencyOrderRoute::<SqliteDatabase>::new())
            .service(CancelEmergencyOrderRoute::<SqliteDatabase>::new())
            .service(FulfillEmergencyOrderRoute::<SqliteDatabase>::new())
            .service(MyEmergencyOrdersRoute::<SqliteDatabase>::new())
            .service(PharmacyEmergencyOrdersRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pds::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(json_config())
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
