use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use stayhub_api::config::AppConfig;
use stayhub_api::db::{mongo, mongo_store::MongoStore};
use stayhub_api::routes;
use stayhub_api::services::email_service::{DisabledMailer, Mailer, SendGridMailer};
use stayhub_api::services::image_service::GcsMediaStore;
use stayhub_api::state::{AppState, Backends};

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    info!("Application starting...");

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let client = mongo::create_mongo_client(&config.mongodb_uri)
        .await
        .map_err(|e| startup_error("Failed to connect to MongoDB", e))?;
    let database = client.database(&config.database_name);
    mongo::ensure_indexes(&database)
        .await
        .map_err(|e| startup_error("Failed to create indexes", e))?;
    info!("MongoDB connection established ({})", config.database_name);

    let media = GcsMediaStore::new(config.media_bucket.clone())
        .await
        .map_err(|e| startup_error("Failed to initialise media store", e))?;

    let mailer: Arc<dyn Mailer> = match &config.sendgrid_api_key {
        Some(key) => Arc::new(SendGridMailer::new(key.clone(), config.email_from.clone())),
        None => {
            warn!("SENDGRID_API_KEY not set, outgoing email is disabled");
            Arc::new(DisabledMailer)
        }
    };

    let store = Arc::new(MongoStore::new(database));
    let state = web::Data::new(AppState::new(
        &config,
        Backends {
            properties: store.clone(),
            bookings: store.clone(),
            reviews: store.clone(),
            users: store.clone(),
            health: store,
            media: Arc::new(media),
            mailer,
        },
    ));

    info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
