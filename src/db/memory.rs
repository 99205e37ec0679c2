use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::store::{
    BookingFilter, BookingStore, HealthCheck, PropertyStore, ReviewStore, StoreError,
    StoreResult, UserStore,
};
use crate::models::{
    booking::{Booking, BookingStatus},
    property::{Property, PropertyQuery, Rating},
    review::{Review, ReviewQuery},
    user::User,
};

/// Process-local store with the same contract as `MongoStore`, including
/// the unique constraints. Used by the test suites and for local runs
/// without a database.
#[derive(Default)]
pub struct MemoryStore {
    properties: Mutex<Vec<Property>>,
    bookings: Mutex<Vec<Booking>>,
    // (property, night) -> booking
    nights: Mutex<HashMap<(String, NaiveDate), String>>,
    reviews: Mutex<Vec<Review>>,
    users: Mutex<Vec<User>>,
    fail_releases: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `release_nights` call fail, as a lost database would.
    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// Nights currently claimed for `property`, in calendar order.
    pub fn claimed_nights(&self, property: &str) -> Vec<NaiveDate> {
        let nights = self.nights.lock().unwrap_or_else(|e| e.into_inner());
        let mut claimed: Vec<NaiveDate> = nights
            .keys()
            .filter(|(p, _)| p == property)
            .map(|(_, night)| *night)
            .collect();
        claimed.sort();
        claimed
    }
}

fn upsert<T: Clone>(items: &Mutex<Vec<T>>, item: &T, same: impl Fn(&T) -> bool) -> bool {
    let mut items = items.lock().unwrap_or_else(|e| e.into_inner());
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => {
            *existing = item.clone();
            true
        }
        None => false,
    }
}

fn remove<T>(items: &Mutex<Vec<T>>, same: impl Fn(&T) -> bool) -> bool {
    let mut items = items.lock().unwrap_or_else(|e| e.into_inner());
    let before = items.len();
    items.retain(|item| !same(item));
    items.len() != before
}

/// Newest first, like the `_id` descending sort on the database.
fn newest_first<T: Clone>(items: &Mutex<Vec<T>>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let items = items.lock().unwrap_or_else(|e| e.into_inner());
    items.iter().rev().filter(|item| keep(item)).cloned().collect()
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn insert(&self, property: &Property) -> StoreResult<()> {
        self.properties
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(property.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Property>> {
        let properties = self.properties.lock().unwrap_or_else(|e| e.into_inner());
        Ok(properties.iter().find(|p| p.id == id).cloned())
    }

    async fn replace(&self, property: &Property) -> StoreResult<bool> {
        Ok(upsert(&self.properties, property, |p| p.id == property.id))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(remove(&self.properties, |p| p.id == id))
    }

    async fn search(&self, query: &PropertyQuery) -> StoreResult<Vec<Property>> {
        let (skip, limit) = query.pagination();
        Ok(newest_first(&self.properties, |p| query.matches(p))
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn ids_created_by(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let properties = self.properties.lock().unwrap_or_else(|e| e.into_inner());
        Ok(properties
            .iter()
            .filter(|p| p.created_by == user_id)
            .map(|p| p.id.clone())
            .collect())
    }

    async fn set_rating(&self, id: &str, rating: Rating) -> StoreResult<()> {
        let mut properties = self.properties.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(property) = properties.iter_mut().find(|p| p.id == id) {
            property.rating = rating;
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        self.bookings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(booking.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Booking>> {
        let bookings = self.bookings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn replace(&self, booking: &Booking) -> StoreResult<bool> {
        Ok(upsert(&self.bookings, booking, |b| b.id == booking.id))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(remove(&self.bookings, |b| b.id == id))
    }

    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        Ok(newest_first(&self.bookings, |b| filter.matches(b)))
    }

    async fn find_overlapping(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<&str>,
    ) -> StoreResult<Vec<Booking>> {
        let bookings = self.bookings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(bookings
            .iter()
            .filter(|b| b.property == property)
            .filter(|b| b.status != BookingStatus::Cancelled)
            .filter(|b| exclude.map_or(true, |id| b.id != id))
            .filter(|b| b.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn claim_nights(
        &self,
        property: &str,
        booking: &str,
        nights: &[NaiveDate],
    ) -> StoreResult<()> {
        let mut claims = self.nights.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(taken) = nights
            .iter()
            .find(|night| claims.contains_key(&(property.to_string(), **night)))
        {
            return Err(StoreError::Duplicate(format!(
                "Property is already booked for the night of {}",
                taken.format("%Y-%m-%d")
            )));
        }
        for night in nights {
            claims.insert((property.to_string(), *night), booking.to_string());
        }
        Ok(())
    }

    async fn release_nights(
        &self,
        booking: &str,
        nights: Option<&[NaiveDate]>,
    ) -> StoreResult<()> {
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(StoreError::Database(mongodb::error::Error::custom(
                "release rejected".to_string(),
            )));
        }
        let only: Option<HashSet<&NaiveDate>> = nights.map(|n| n.iter().collect());
        let mut claims = self.nights.lock().unwrap_or_else(|e| e.into_inner());
        claims.retain(|(_, night), holder| {
            holder != booking || only.as_ref().map_or(false, |n| !n.contains(night))
        });
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert(&self, review: &Review) -> StoreResult<()> {
        let mut reviews = self.reviews.lock().unwrap_or_else(|e| e.into_inner());
        if reviews
            .iter()
            .any(|r| r.booking == review.booking && r.user == review.user)
        {
            return Err(StoreError::Duplicate(
                "You have already reviewed this booking".to_string(),
            ));
        }
        reviews.push(review.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Review>> {
        let reviews = self.reviews.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn find_for_booking(&self, booking: &str, user: &str) -> StoreResult<Option<Review>> {
        let reviews = self.reviews.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reviews
            .iter()
            .find(|r| r.booking == booking && r.user == user)
            .cloned())
    }

    async fn replace(&self, review: &Review) -> StoreResult<bool> {
        Ok(upsert(&self.reviews, review, |r| r.id == review.id))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(remove(&self.reviews, |r| r.id == id))
    }

    async fn list(&self, query: &ReviewQuery) -> StoreResult<Vec<Review>> {
        Ok(newest_first(&self.reviews, |r| {
            query.property.as_ref().map_or(true, |p| &r.property == p)
                && query.user.as_ref().map_or(true, |u| &r.user == u)
        }))
    }

    async fn ratings_for_property(&self, property: &str) -> StoreResult<Vec<u8>> {
        let reviews = self.reviews.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reviews
            .iter()
            .filter(|r| r.property == property)
            .map(|r| r.rating)
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(
                "Email is already registered".to_string(),
            ));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users
            .iter()
            .find(|u| u.reset_password_token.as_deref() == Some(token))
            .cloned())
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        Ok(upsert(&self.users, user, |u| u.id == user.id))
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(newest_first(&self.users, |_| true))
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
