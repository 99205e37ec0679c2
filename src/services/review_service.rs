use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::db::store::{BookingStore, PropertyStore, ReviewStore};
use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::booking::BookingStatus;
use crate::models::new_id;
use crate::models::property::Rating;
use crate::models::review::{
    validate_rating, validate_text, NewReview, Review, ReviewPatch, ReviewQuery, ReviewReply,
};

/// Mean of the ratings rounded up to one decimal, or the baseline when
/// there is nothing to average.
pub fn summarize_ratings(ratings: &[u8]) -> Rating {
    if ratings.is_empty() {
        return Rating::baseline();
    }
    let count = ratings.len() as u32;
    let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
    // integer ceiling on tenths keeps 4.1 from drifting to 4.2
    let tenths = (sum * 10 + count - 1) / count;
    Rating {
        average: f64::from(tenths) / 10.0,
        count,
    }
}

#[derive(Clone)]
pub struct ReviewAggregator {
    reviews: Arc<dyn ReviewStore>,
    bookings: Arc<dyn BookingStore>,
    properties: Arc<dyn PropertyStore>,
}

impl ReviewAggregator {
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        bookings: Arc<dyn BookingStore>,
        properties: Arc<dyn PropertyStore>,
    ) -> Self {
        Self {
            reviews,
            bookings,
            properties,
        }
    }

    async fn load(&self, id: &str) -> Result<Review, ApiError> {
        self.reviews
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Review"))
    }

    /// Rewrites the cached rating on the property from its reviews.
    pub async fn recompute(&self, property_id: &str) -> Result<Rating, ApiError> {
        let ratings = self.reviews.ratings_for_property(property_id).await?;
        let rating = summarize_ratings(&ratings);
        self.properties.set_rating(property_id, rating).await?;
        Ok(rating)
    }

    pub async fn list(&self, query: &ReviewQuery) -> Result<Vec<Review>, ApiError> {
        Ok(self.reviews.list(query).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Review, ApiError> {
        self.load(id).await
    }

    /// Only the guest of a finished stay may review it, once.
    pub async fn add(
        &self,
        property_id: &str,
        actor: &Identity,
        input: NewReview,
    ) -> Result<Review, ApiError> {
        validate_rating(input.rating)?;
        validate_text("Comment", &input.comment)?;

        if self.properties.find_by_id(property_id).await?.is_none() {
            return Err(ApiError::not_found("Property"));
        }
        let booking = self
            .bookings
            .find_by_id(&input.booking)
            .await?
            .ok_or_else(|| ApiError::not_found("Booking"))?;
        if booking.user != actor.user_id {
            return Err(ApiError::forbidden("You can only review your own bookings"));
        }
        if booking.property != property_id {
            return Err(ApiError::validation(
                "Booking does not belong to this property",
            ));
        }
        let stay_finished = booking.status == BookingStatus::Completed
            && booking
                .checked_out_at
                .map_or(false, |at| at <= Utc::now());
        if !stay_finished {
            return Err(ApiError::validation(
                "You can only review a stay after checking out",
            ));
        }
        if self
            .reviews
            .find_for_booking(&booking.id, &actor.user_id)
            .await?
            .is_some()
        {
            return Err(ApiError::conflict("You have already reviewed this booking"));
        }

        let now = Utc::now();
        let review = Review {
            id: new_id(),
            property: property_id.to_string(),
            user: actor.user_id.clone(),
            booking: booking.id.clone(),
            rating: input.rating,
            comment: input.comment.trim().to_string(),
            reply: None,
            created_at: now,
            updated_at: now,
        };
        self.reviews.insert(&review).await?;
        let rating = self.recompute(property_id).await?;
        info!(
            "Review {} added to property {} (now {:.1} over {})",
            review.id, property_id, rating.average, rating.count
        );
        Ok(review)
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &Identity,
        patch: ReviewPatch,
    ) -> Result<Review, ApiError> {
        let mut review = self.load(id).await?;
        if !actor.can_manage(&review.user) {
            return Err(ApiError::forbidden("Not authorized to update this review"));
        }
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
            review.rating = rating;
        }
        if let Some(comment) = patch.comment {
            validate_text("Comment", &comment)?;
            review.comment = comment.trim().to_string();
        }
        review.updated_at = Utc::now();

        self.reviews.replace(&review).await?;
        self.recompute(&review.property).await?;
        Ok(review)
    }

    pub async fn delete(&self, id: &str, actor: &Identity) -> Result<(), ApiError> {
        let review = self.load(id).await?;
        if !actor.can_manage(&review.user) {
            return Err(ApiError::forbidden("Not authorized to delete this review"));
        }
        self.reviews.delete(&review.id).await?;
        self.recompute(&review.property).await?;
        Ok(())
    }

    async fn authorize_host(&self, review: &Review, actor: &Identity) -> Result<(), ApiError> {
        if actor.is_admin() {
            return Ok(());
        }
        let property = self
            .properties
            .find_by_id(&review.property)
            .await?
            .ok_or_else(|| ApiError::not_found("Property"))?;
        if property.created_by != actor.user_id {
            return Err(ApiError::forbidden("Only the property owner can reply to reviews"));
        }
        Ok(())
    }

    pub async fn reply(&self, id: &str, actor: &Identity, text: String) -> Result<Review, ApiError> {
        let mut review = self.load(id).await?;
        self.authorize_host(&review, actor).await?;
        validate_text("Reply", &text)?;
        if review.reply.is_some() {
            return Err(ApiError::conflict("This review already has a reply"));
        }

        let now = Utc::now();
        review.reply = Some(ReviewReply {
            text: text.trim().to_string(),
            replied_by: actor.user_id.clone(),
            replied_at: now,
        });
        review.updated_at = now;
        self.reviews.replace(&review).await?;
        Ok(review)
    }

    pub async fn remove_reply(&self, id: &str, actor: &Identity) -> Result<Review, ApiError> {
        let mut review = self.load(id).await?;
        self.authorize_host(&review, actor).await?;
        if review.reply.take().is_none() {
            return Err(ApiError::not_found("Reply"));
        }
        review.updated_at = Utc::now();
        self.reviews.replace(&review).await?;
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::booking::{Booking, PaymentMethod, PaymentStatus};
    use crate::models::property::{Address, Features, Property};
    use crate::models::user::UserRole;
    use chrono::NaiveDate;

    #[test]
    fn average_rounds_up_to_one_decimal() {
        let rating = summarize_ratings(&[5, 4, 4]);
        assert_eq!(rating.average, 4.4);
        assert_eq!(rating.count, 3);
        assert_eq!(summarize_ratings(&[4, 5]).average, 4.5);
        assert_eq!(summarize_ratings(&[3, 3, 3]).average, 3.0);
        assert_eq!(summarize_ratings(&[5, 4, 4, 4, 4, 4, 4, 4, 4, 4]).average, 4.1);
    }

    #[test]
    fn no_reviews_falls_back_to_baseline() {
        let rating = summarize_ratings(&[]);
        assert_eq!(rating.average, 4.5);
        assert_eq!(rating.count, 0);
    }

    fn who(id: &str, role: UserRole) -> Identity {
        Identity {
            user_id: id.into(),
            role,
        }
    }

    fn booking(id: &str, user: &str, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: id.into(),
            property: "p1".into(),
            user: user.into(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            guests: 1,
            total_price: 300.0,
            status,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Cash,
            special_requests: None,
            payment_proof: None,
            cancellation: None,
            checked_in_at: Some(now),
            checked_out_at: (status == BookingStatus::Completed).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, ReviewAggregator) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let property = Property {
            id: "p1".into(),
            title: "Cottage".into(),
            description: "Garden cottage".into(),
            price: 100.0,
            address: Address {
                street: "3 Oak Ave".into(),
                city: "Stellenbosch".into(),
                state: None,
                zip_code: None,
                country: None,
            },
            features: Features {
                bedrooms: 1,
                bathrooms: 1,
                parking: true,
                furnished: true,
                available_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                available_to: None,
            },
            images: vec![],
            is_available: true,
            created_by: "host".into(),
            rating: Rating::baseline(),
            created_at: now,
            updated_at: now,
        };
        PropertyStore::insert(store.as_ref(), &property).await.unwrap();
        for b in [
            booking("done", "guest", BookingStatus::Completed),
            booking("done2", "other", BookingStatus::Completed),
            booking("staying", "guest", BookingStatus::CheckedIn),
        ] {
            BookingStore::insert(store.as_ref(), &b).await.unwrap();
        }
        let aggregator = ReviewAggregator::new(store.clone(), store.clone(), store.clone());
        (store, aggregator)
    }

    fn review_of(booking: &str, rating: u8) -> NewReview {
        NewReview {
            booking: booking.into(),
            rating,
            comment: "Great host".into(),
        }
    }

    async fn property_rating(store: &MemoryStore) -> Rating {
        PropertyStore::find_by_id(store, "p1")
            .await
            .unwrap()
            .unwrap()
            .rating
    }

    #[actix_rt::test]
    async fn reviews_move_the_cached_rating() {
        let (store, aggregator) = setup().await;
        let first = aggregator
            .add("p1", &who("guest", UserRole::User), review_of("done", 5))
            .await
            .unwrap();
        aggregator
            .add("p1", &who("other", UserRole::User), review_of("done2", 4))
            .await
            .unwrap();
        assert_eq!(property_rating(&store).await, Rating { average: 4.5, count: 2 });

        aggregator
            .update(
                &first.id,
                &who("guest", UserRole::User),
                ReviewPatch {
                    rating: Some(2),
                    comment: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(property_rating(&store).await.average, 3.0);

        aggregator
            .delete(&first.id, &who("guest", UserRole::User))
            .await
            .unwrap();
        assert_eq!(property_rating(&store).await, Rating { average: 4.0, count: 1 });
    }

    #[actix_rt::test]
    async fn one_review_per_stay() {
        let (_, aggregator) = setup().await;
        let guest = who("guest", UserRole::User);
        aggregator.add("p1", &guest, review_of("done", 5)).await.unwrap();
        assert!(matches!(
            aggregator.add("p1", &guest, review_of("done", 3)).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[actix_rt::test]
    async fn unfinished_or_foreign_stays_cannot_be_reviewed() {
        let (_, aggregator) = setup().await;
        let guest = who("guest", UserRole::User);
        assert!(matches!(
            aggregator.add("p1", &guest, review_of("staying", 5)).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            aggregator.add("p1", &guest, review_of("done2", 5)).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            aggregator.add("p1", &guest, review_of("done", 9)).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[actix_rt::test]
    async fn only_the_host_replies_and_only_once() {
        let (_, aggregator) = setup().await;
        let review = aggregator
            .add("p1", &who("guest", UserRole::User), review_of("done", 5))
            .await
            .unwrap();

        assert!(matches!(
            aggregator
                .reply(&review.id, &who("guest", UserRole::User), "Thanks".into())
                .await,
            Err(ApiError::Forbidden(_))
        ));

        let host = who("host", UserRole::Owner);
        let replied = aggregator
            .reply(&review.id, &host, "Thanks for staying".into())
            .await
            .unwrap();
        assert_eq!(replied.reply.unwrap().replied_by, "host");
        assert!(matches!(
            aggregator.reply(&review.id, &host, "Again".into()).await,
            Err(ApiError::Conflict(_))
        ));

        let cleared = aggregator.remove_reply(&review.id, &host).await.unwrap();
        assert!(cleared.reply.is_none());
        assert!(matches!(
            aggregator.remove_reply(&review.id, &host).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
