use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::store::{BookingStore, HealthCheck, PropertyStore, ReviewStore, UserStore};
use crate::middleware::auth::JwtKeys;
use crate::services::{
    account_service::AccountService, availability_service::AvailabilityChecker,
    booking_service::BookingLedger, email_service::Mailer, image_service::MediaStore,
    payment_proof_service::PaymentProofTracker, property_service::PropertyRegistry,
    review_service::ReviewAggregator,
};

/// Storage and outbound collaborators the services are built from.
#[derive(Clone)]
pub struct Backends {
    pub properties: Arc<dyn PropertyStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub users: Arc<dyn UserStore>,
    pub health: Arc<dyn HealthCheck>,
    pub media: Arc<dyn MediaStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// Shared across workers through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtKeys,
    pub max_upload_bytes: usize,
    pub properties: PropertyRegistry,
    pub availability: AvailabilityChecker,
    pub bookings: BookingLedger,
    pub payments: PaymentProofTracker,
    pub reviews: ReviewAggregator,
    pub accounts: AccountService,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    pub fn new(config: &AppConfig, backends: Backends) -> Self {
        let jwt = JwtKeys::new(config.jwt_secret.clone(), config.jwt_expires_hours);
        let availability = AvailabilityChecker::new(backends.bookings.clone());

        Self {
            properties: PropertyRegistry::new(
                backends.properties.clone(),
                backends.media.clone(),
                config.max_upload_bytes,
            ),
            bookings: BookingLedger::new(
                backends.properties.clone(),
                backends.bookings.clone(),
                availability.clone(),
            ),
            payments: PaymentProofTracker::new(
                backends.bookings.clone(),
                backends.media.clone(),
                config.max_upload_bytes,
            ),
            reviews: ReviewAggregator::new(
                backends.reviews,
                backends.bookings,
                backends.properties,
            ),
            accounts: AccountService::new(
                backends.users,
                backends.mailer,
                jwt.clone(),
                config.client_url.clone(),
            ),
            availability,
            jwt,
            max_upload_bytes: config.max_upload_bytes,
            health: backends.health,
        }
    }
}
