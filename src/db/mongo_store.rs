use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    Collection, Database,
};

use crate::db::mongo::{BOOKINGS, BOOKING_NIGHTS, PROPERTIES, REVIEWS, USERS};
use crate::db::store::{
    BookingFilter, BookingStore, HealthCheck, PropertyStore, ReviewStore, StoreError,
    StoreResult, UserStore,
};
use crate::models::{
    booking::Booking,
    property::{Property, PropertyQuery, Rating},
    review::{Review, ReviewQuery},
    user::User,
};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed implementation of every store trait.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn properties(&self) -> Collection<Property> {
        self.db.collection(PROPERTIES)
    }

    fn bookings(&self) -> Collection<Booking> {
        self.db.collection(BOOKINGS)
    }

    fn nights(&self) -> Collection<Document> {
        self.db.collection(BOOKING_NIGHTS)
    }

    fn reviews(&self) -> Collection<Review> {
        self.db.collection(REVIEWS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn case_insensitive(pattern: &str) -> Document {
    doc! { "$regex": regex::escape(pattern.trim()), "$options": "i" }
}

fn property_filter(query: &PropertyQuery) -> Document {
    let mut clauses: Vec<Document> = Vec::new();

    if let Some(city) = query.city.as_deref().filter(|c| !c.trim().is_empty()) {
        clauses.push(doc! { "address.city": case_insensitive(city) });
    }

    let mut price = Document::new();
    if let Some(min) = query.min_price {
        price.insert("$gte", min);
    }
    if let Some(max) = query.max_price {
        price.insert("$lte", max);
    }
    if !price.is_empty() {
        clauses.push(doc! { "price": price });
    }

    if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        clauses.push(doc! {
            "$or": [
                { "title": case_insensitive(keyword) },
                { "description": case_insensitive(keyword) },
            ]
        });
    }

    if let Some(end) = query.end_date {
        clauses.push(doc! { "features.availableFrom": { "$lte": day(end) } });
    }
    if let Some(start) = query.start_date {
        clauses.push(doc! {
            "$or": [
                { "features.availableTo": Bson::Null },
                { "features.availableTo": { "$gte": day(start) } },
            ]
        });
    }

    if clauses.is_empty() {
        doc! {}
    } else {
        doc! { "$and": clauses }
    }
}

fn booking_filter(filter: &BookingFilter) -> Document {
    let mut query = doc! {};
    if let Some(property) = &filter.property {
        query.insert("property", property.as_str());
    }
    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    if let Some(visibility) = &filter.visible_to {
        query.insert(
            "$or",
            vec![
                doc! { "user": visibility.user.as_str() },
                doc! { "property": { "$in": visibility.properties.clone() } },
            ],
        );
    }
    query
}

#[async_trait]
impl PropertyStore for MongoStore {
    async fn insert(&self, property: &Property) -> StoreResult<()> {
        self.properties().insert_one(property).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Property>> {
        Ok(self.properties().find_one(doc! { "_id": id }).await?)
    }

    async fn replace(&self, property: &Property) -> StoreResult<bool> {
        let result = self
            .properties()
            .replace_one(doc! { "_id": property.id.as_str() }, property)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = self.properties().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn search(&self, query: &PropertyQuery) -> StoreResult<Vec<Property>> {
        let (skip, limit) = query.pagination();
        let cursor = self
            .properties()
            .find(property_filter(query))
            .sort(doc! { "_id": -1 })
            .skip(skip)
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ids_created_by(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let cursor = self
            .db
            .collection::<Document>(PROPERTIES)
            .find(doc! { "createdBy": user_id })
            .projection(doc! { "_id": 1 })
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str("_id").ok().map(str::to_string))
            .collect())
    }

    async fn set_rating(&self, id: &str, rating: Rating) -> StoreResult<()> {
        self.properties()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "rating.average": rating.average,
                    "rating.count": rating.count as i64,
                } },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MongoStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        self.bookings().insert_one(booking).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Booking>> {
        Ok(self.bookings().find_one(doc! { "_id": id }).await?)
    }

    async fn replace(&self, booking: &Booking) -> StoreResult<bool> {
        let result = self
            .bookings()
            .replace_one(doc! { "_id": booking.id.as_str() }, booking)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = self.bookings().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let cursor = self
            .bookings()
            .find(booking_filter(filter))
            .sort(doc! { "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_overlapping(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<&str>,
    ) -> StoreResult<Vec<Booking>> {
        let mut filter = doc! {
            "property": property,
            "status": { "$ne": "cancelled" },
            "startDate": { "$lt": day(end) },
            "endDate": { "$gt": day(start) },
        };
        if let Some(exclude) = exclude {
            filter.insert("_id", doc! { "$ne": exclude });
        }
        let cursor = self.bookings().find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn claim_nights(
        &self,
        property: &str,
        booking: &str,
        nights: &[NaiveDate],
    ) -> StoreResult<()> {
        let mut claimed: Vec<String> = Vec::with_capacity(nights.len());
        for night in nights {
            let night = day(*night);
            let claim = doc! {
                "property": property,
                "night": night.as_str(),
                "booking": booking,
            };
            match self.nights().insert_one(claim).await {
                Ok(_) => claimed.push(night),
                Err(err) => {
                    if !claimed.is_empty() {
                        self.nights()
                            .delete_many(doc! { "booking": booking, "night": { "$in": claimed } })
                            .await?;
                    }
                    if is_duplicate_key(&err) {
                        return Err(StoreError::Duplicate(format!(
                            "Property is already booked for the night of {}",
                            night
                        )));
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    async fn release_nights(
        &self,
        booking: &str,
        nights: Option<&[NaiveDate]>,
    ) -> StoreResult<()> {
        let filter = match nights {
            Some(nights) => {
                let days: Vec<String> = nights.iter().map(|n| day(*n)).collect();
                doc! { "booking": booking, "night": { "$in": days } }
            }
            None => doc! { "booking": booking },
        };
        self.nights().delete_many(filter).await?;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MongoStore {
    async fn insert(&self, review: &Review) -> StoreResult<()> {
        match self.reviews().insert_one(review).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::Duplicate(
                "You have already reviewed this booking".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Review>> {
        Ok(self.reviews().find_one(doc! { "_id": id }).await?)
    }

    async fn find_for_booking(&self, booking: &str, user: &str) -> StoreResult<Option<Review>> {
        Ok(self
            .reviews()
            .find_one(doc! { "booking": booking, "user": user })
            .await?)
    }

    async fn replace(&self, review: &Review) -> StoreResult<bool> {
        let result = self
            .reviews()
            .replace_one(doc! { "_id": review.id.as_str() }, review)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = self.reviews().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list(&self, query: &ReviewQuery) -> StoreResult<Vec<Review>> {
        let mut filter = doc! {};
        if let Some(property) = &query.property {
            filter.insert("property", property.as_str());
        }
        if let Some(user) = &query.user {
            filter.insert("user", user.as_str());
        }
        let cursor = self
            .reviews()
            .find(filter)
            .sort(doc! { "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ratings_for_property(&self, property: &str) -> StoreResult<Vec<u8>> {
        let cursor = self.reviews().find(doc! { "property": property }).await?;
        let reviews: Vec<Review> = cursor.try_collect().await?;
        Ok(reviews.into_iter().map(|r| r.rating).collect())
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        match self.users().insert_one(user).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::Duplicate(
                "Email is already registered".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "resetPasswordToken": token })
            .await?)
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        let result = self
            .users()
            .replace_one(doc! { "_id": user.id.as_str() }, user)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let cursor = self.users().find(doc! {}).sort(doc! { "_id": -1 }).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl HealthCheck for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
