use actix_web::{error, web, HttpRequest};

use crate::error::ApiError;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod properties;
pub mod reviews;
pub mod upload;

fn bad_request(err: impl std::fmt::Display, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(err.to_string()).into()
}

/// Mounts the whole API under `/api`. Malformed bodies, queries and paths
/// come back as validation errors in the usual envelope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err: error::JsonPayloadError, req| {
        bad_request(err, req)
    }))
    .app_data(web::QueryConfig::default().error_handler(|err: error::QueryPayloadError, req| {
        bad_request(err, req)
    }))
    .app_data(web::PathConfig::default().error_handler(|err: error::PathError, req| {
        bad_request(err, req)
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .configure(auth::config)
            .configure(properties::config)
            .configure(bookings::config)
            .configure(reviews::config)
            .configure(admin::config),
    );
}
