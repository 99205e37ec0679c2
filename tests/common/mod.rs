#![allow(dead_code)]

use std::sync::Arc;

use actix_web::{
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::header,
    test, web, App, Error,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use stayhub_api::config::AppConfig;
use stayhub_api::db::memory::MemoryStore;
use stayhub_api::db::store::UserStore;
use stayhub_api::middleware::auth_context::Identity;
use stayhub_api::models::booking::{Booking, NewBooking, PaymentMethod};
use stayhub_api::models::property::{NewProperty, Property};
use stayhub_api::models::user::{User, UserRole};
use stayhub_api::routes;
use stayhub_api::services::email_service::DisabledMailer;
use stayhub_api::services::image_service::MemoryMediaStore;
use stayhub_api::state::{AppState, Backends};

pub const HOST_ID: &str = "host-1";
pub const GUEST_ID: &str = "guest-1";
pub const ADMIN_ID: &str = "admin-1";
pub const MAX_UPLOAD_BYTES: usize = 1024;

const BOUNDARY: &str = "stayhub-test-boundary";

pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        mongodb_uri: "mongodb://unused".to_string(),
        database_name: "stayhub_test".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_expires_hours: 1,
        media_bucket: "test-bucket".to_string(),
        max_upload_bytes: MAX_UPLOAD_BYTES,
        sendgrid_api_key: None,
        email_from: "noreply@example.com".to_string(),
        client_url: "http://localhost:3000".to_string(),
    }
}

/// The real route table over in-memory backends.
pub struct TestApp {
    pub state: web::Data<AppState>,
    pub store: Arc<MemoryStore>,
    pub media: Arc<MemoryMediaStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(MemoryMediaStore::new());
        let state = AppState::new(
            &test_config(),
            Backends {
                properties: store.clone(),
                bookings: store.clone(),
                reviews: store.clone(),
                users: store.clone(),
                health: store.clone(),
                media: media.clone(),
                mailer: Arc::new(DisabledMailer),
            },
        );
        Self {
            state: web::Data::new(state),
            store,
            media,
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(self.state.clone())
            .configure(routes::configure)
    }

    pub fn bearer(&self, user_id: &str, role: UserRole) -> (header::HeaderName, String) {
        let token = self.state.jwt.issue(user_id, role).unwrap();
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    pub fn host(&self) -> (header::HeaderName, String) {
        self.bearer(HOST_ID, UserRole::Owner)
    }

    pub fn guest(&self) -> (header::HeaderName, String) {
        self.bearer(GUEST_ID, UserRole::User)
    }

    pub fn admin(&self) -> (header::HeaderName, String) {
        self.bearer(ADMIN_ID, UserRole::Admin)
    }

    /// Stores the account behind `admin()`. Admin routes check the stored
    /// role, so a token alone does not get in.
    pub async fn seed_admin(&self) {
        let now = Utc::now();
        let admin = User {
            id: ADMIN_ID.to_string(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            phone: None,
            role: UserRole::Admin,
            password_hash: "unused".to_string(),
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&admin).await.unwrap();
    }

    /// A listing owned by `HOST_ID` at 200 per night.
    pub async fn seed_property(&self) -> Property {
        let input: NewProperty = serde_json::from_value(property_json()).unwrap();
        self.state
            .properties
            .create(&identity(HOST_ID, UserRole::Owner), input)
            .await
            .unwrap()
    }

    pub async fn seed_booking(&self, property: &str, start: &str, end: &str) -> Booking {
        self.state
            .bookings
            .create(
                property,
                &identity(GUEST_ID, UserRole::User),
                NewBooking {
                    start_date: date(start),
                    end_date: date(end),
                    guests: 2,
                    payment_method: PaymentMethod::Eft,
                    special_requests: None,
                },
            )
            .await
            .unwrap()
    }

    /// A guest booking taken all the way through check-out.
    pub async fn seed_completed_stay(&self, property: &str, start: &str, end: &str) -> Booking {
        let booking = self.seed_booking(property, start, end).await;
        let host = identity(HOST_ID, UserRole::Owner);
        self.state.bookings.confirm(&booking.id, &host).await.unwrap();
        self.state.bookings.check_in(&booking.id, &host).await.unwrap();
        self.state.bookings.check_out(&booking.id, &host).await.unwrap()
    }
}

pub fn identity(user_id: &str, role: UserRole) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        role,
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn property_json() -> Value {
    json!({
        "title": "Sea view apartment",
        "description": "Two bedrooms right on the promenade",
        "price": 200.0,
        "address": {
            "street": "12 Beach Rd",
            "city": "Cape Town",
            "country": "South Africa"
        },
        "features": {
            "bedrooms": 2,
            "bathrooms": 1,
            "parking": true,
            "furnished": true,
            "availableFrom": "2024-01-01"
        }
    })
}

/// A single-file multipart body and the matching content type header.
pub fn multipart(
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> (String, Vec<u8>) {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
        b = BOUNDARY,
        field = field,
        file_name = file_name,
        content_type = content_type,
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub async fn body_json(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}
