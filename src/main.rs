use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;

use club_sessions::database::init_database;
use club_sessions::middleware::RequestId;
use club_sessions::services::{Channels, SystemClock};
use club_sessions::{AppState, Config, Stores, routes};

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init();

    log::info!("Starting club sessions API");

    let config = Config::from_env()?;
    log::info!(
        "Configuration loaded (environment: {}, timezone: {})",
        config.environment,
        config.timezone
    );

    let pool = init_database(&config.database_url).await?;

    let channels = Channels::from_config(&config)?;
    if channels.is_empty() {
        if config.is_production() {
            log::warn!("No push gateway or email API configured; notifications are disabled");
        } else {
            log::info!("Notifications disabled (no push gateway or email API configured)");
        }
    }

    let state = AppState::build(
        config.clone(),
        Stores::postgres(pool),
        channels,
        Arc::new(SystemClock),
    )?;

    if let Err(e) = state.recurrence.refresh_all().await {
        log::error!("Startup recurring refresh failed: {}", e);
    }
    let scheduler = state.scheduler.clone().start();

    let state = web::Data::new(state);
    let config_data = web::Data::new(config.clone());
    let frontend_url = config.frontend_url.clone();

    let server_address = config.server_address();
    log::info!("Listening on http://{}", server_address);

    let served = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(config_data.clone())
            .wrap(
                Cors::default()
                    .allowed_origin(&frontend_url)
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Correlation-ID",
                    ])
                    .expose_headers(vec!["X-Correlation-ID"])
                    .max_age(3600),
            )
            .wrap(RequestId)
            .wrap(Logger::new(
                r#"%a "%r" %s %b %T correlation_id=%{x-correlation-id}o"#,
            ))
            .configure(routes::configure)
    })
    .bind(&server_address)?
    .run()
    .await;

    scheduler.stop().await;

    served.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
