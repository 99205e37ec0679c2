use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{
    booking::{Booking, BookingStatus},
    property::{Property, PropertyQuery, Rating},
    review::{Review, ReviewQuery},
    user::User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("{0}")]
    Duplicate(String),
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(message) => ApiError::Conflict(message),
            StoreError::Database(err) => ApiError::Internal(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Restricts a booking listing to what a non-admin may see: bookings they
/// requested, plus bookings on properties they created.
#[derive(Debug, Clone)]
pub struct Visibility {
    pub user: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub property: Option<String>,
    pub status: Option<BookingStatus>,
    pub visible_to: Option<Visibility>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(property) = &self.property {
            if &booking.property != property {
                return false;
            }
        }
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(visibility) = &self.visible_to {
            if booking.user != visibility.user
                && !visibility.properties.contains(&booking.property)
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert(&self, property: &Property) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Property>>;
    /// Whole-document replace, last write wins. Returns false if no such id.
    async fn replace(&self, property: &Property) -> StoreResult<bool>;
    async fn delete(&self, id: &str) -> StoreResult<bool>;
    async fn search(&self, query: &PropertyQuery) -> StoreResult<Vec<Property>>;
    async fn ids_created_by(&self, user_id: &str) -> StoreResult<Vec<String>>;
    async fn set_rating(&self, id: &str, rating: Rating) -> StoreResult<()>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: &Booking) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Booking>>;
    async fn replace(&self, booking: &Booking) -> StoreResult<bool>;
    async fn delete(&self, id: &str) -> StoreResult<bool>;
    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;
    /// Non-cancelled bookings of `property` overlapping `[start, end)`,
    /// skipping `exclude` so a booking never conflicts with itself.
    async fn find_overlapping(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<&str>,
    ) -> StoreResult<Vec<Booking>>;
    /// Atomically reserves each night for `booking`. If any night is already
    /// held by another booking nothing is kept and `Duplicate` is returned.
    async fn claim_nights(
        &self,
        property: &str,
        booking: &str,
        nights: &[NaiveDate],
    ) -> StoreResult<()>;
    /// Releases the given nights held by `booking`, or all of them on `None`.
    async fn release_nights(&self, booking: &str, nights: Option<&[NaiveDate]>)
        -> StoreResult<()>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fails with `Duplicate` when the (booking, user) pair already has a review.
    async fn insert(&self, review: &Review) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Review>>;
    async fn find_for_booking(&self, booking: &str, user: &str) -> StoreResult<Option<Review>>;
    async fn replace(&self, review: &Review) -> StoreResult<bool>;
    async fn delete(&self, id: &str) -> StoreResult<bool>;
    async fn list(&self, query: &ReviewQuery) -> StoreResult<Vec<Review>>;
    async fn ratings_for_property(&self, property: &str) -> StoreResult<Vec<u8>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate` when the email is taken.
    async fn insert(&self, user: &User) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>>;
    async fn replace(&self, user: &User) -> StoreResult<bool>;
    async fn list(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}
