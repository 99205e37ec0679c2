use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use log::{error, info};

use crate::db::store::{BookingFilter, BookingStore, PropertyStore, Visibility};
use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::booking::{
    validate_special_requests, Booking, BookingPatch, BookingQuery, BookingStatus, Cancellation,
    NewBooking, PaymentStatus, MAX_STAY_NIGHTS,
};
use crate::models::new_id;
use crate::models::property::Property;
use crate::services::availability_service::AvailabilityChecker;
use crate::services::pricing_service::PricingService;

/// Guests must cancel at least this long before check-in. Admins are exempt.
const MIN_CANCELLATION_NOTICE_DAYS: i64 = 2;

const DATES_TAKEN: &str = "Property is not available for the selected dates";

fn validate_stay(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    AvailabilityChecker::validate_range(start, end)?;
    if PricingService::nights(start, end) > MAX_STAY_NIGHTS {
        return Err(ApiError::Validation(format!(
            "A booking cannot exceed {} nights",
            MAX_STAY_NIGHTS
        )));
    }
    Ok(())
}

/// Owns the booking lifecycle. Every write that adds nights to a booking
/// claims them in the store first, so two bookings can never hold the same
/// night even when requests race past the availability check.
#[derive(Clone)]
pub struct BookingLedger {
    properties: Arc<dyn PropertyStore>,
    bookings: Arc<dyn BookingStore>,
    availability: AvailabilityChecker,
}

impl BookingLedger {
    pub fn new(
        properties: Arc<dyn PropertyStore>,
        bookings: Arc<dyn BookingStore>,
        availability: AvailabilityChecker,
    ) -> Self {
        Self {
            properties,
            bookings,
            availability,
        }
    }

    async fn load(&self, id: &str) -> Result<Booking, ApiError> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Booking"))
    }

    async fn load_property(&self, id: &str) -> Result<Property, ApiError> {
        self.properties
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Property"))
    }

    /// Property creator of a booking, or None once the listing is gone.
    async fn host_of(&self, booking: &Booking) -> Result<Option<String>, ApiError> {
        Ok(self
            .properties
            .find_by_id(&booking.property)
            .await?
            .map(|p| p.created_by))
    }

    async fn authorize(&self, booking: &Booking, actor: &Identity) -> Result<(), ApiError> {
        if actor.is_admin() || booking.user == actor.user_id {
            return Ok(());
        }
        match self.host_of(booking).await? {
            Some(host) if host == actor.user_id => Ok(()),
            _ => Err(ApiError::forbidden("Not authorized to access this booking")),
        }
    }

    async fn authorize_host(&self, booking: &Booking, actor: &Identity) -> Result<(), ApiError> {
        if actor.is_admin() {
            return Ok(());
        }
        match self.host_of(booking).await? {
            Some(host) if host == actor.user_id => Ok(()),
            _ => Err(ApiError::forbidden("Only the property owner can manage this booking")),
        }
    }

    async fn release_all(&self, booking: &Booking) -> Result<(), ApiError> {
        self.bookings
            .release_nights(&booking.id, None)
            .await
            .map_err(|err| {
                error!("Failed to release nights of booking {}: {}", booking.id, err);
                ApiError::from(err)
            })
    }

    /// Puts back nights released ahead of a write that then failed. Another
    /// booking may have taken them in between; that is logged, not raised.
    async fn reclaim(&self, booking: &Booking, nights: &[NaiveDate]) {
        if nights.is_empty() {
            return;
        }
        if let Err(err) = self
            .bookings
            .claim_nights(&booking.property, &booking.id, nights)
            .await
        {
            error!(
                "Booking {} could not reclaim {} nights after a failed write: {}",
                booking.id,
                nights.len(),
                err
            );
        }
    }

    pub async fn get(&self, id: &str, actor: &Identity) -> Result<Booking, ApiError> {
        let booking = self.load(id).await?;
        self.authorize(&booking, actor).await?;
        Ok(booking)
    }

    /// Admins see every booking; everyone else sees what they booked plus
    /// bookings on the properties they listed.
    pub async fn list(&self, actor: &Identity, query: BookingQuery) -> Result<Vec<Booking>, ApiError> {
        let visible_to = if actor.is_admin() {
            None
        } else {
            Some(Visibility {
                user: actor.user_id.clone(),
                properties: self.properties.ids_created_by(&actor.user_id).await?,
            })
        };
        let filter = BookingFilter {
            property: query.property,
            status: query.status,
            visible_to,
        };
        Ok(self.bookings.list(&filter).await?)
    }

    pub async fn create(
        &self,
        property_id: &str,
        actor: &Identity,
        input: NewBooking,
    ) -> Result<Booking, ApiError> {
        validate_stay(input.start_date, input.end_date)?;
        if input.guests == 0 {
            return Err(ApiError::validation("At least one guest is required"));
        }
        validate_special_requests(input.special_requests.as_deref()).map_err(ApiError::Validation)?;

        let property = self.load_property(property_id).await?;
        if !self
            .availability
            .is_available(&property, input.start_date, input.end_date, None)
            .await?
        {
            return Err(ApiError::conflict(DATES_TAKEN));
        }

        let now = Utc::now();
        let booking = Booking {
            id: new_id(),
            property: property.id.clone(),
            user: actor.user_id.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            guests: input.guests,
            total_price: PricingService::total_price(property.price, input.start_date, input.end_date),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            special_requests: input.special_requests,
            payment_proof: None,
            cancellation: None,
            checked_in_at: None,
            checked_out_at: None,
            created_at: now,
            updated_at: now,
        };

        self.bookings
            .claim_nights(&property.id, &booking.id, &booking.nights())
            .await?;
        if let Err(err) = self.bookings.insert(&booking).await {
            let _ = self.release_all(&booking).await;
            return Err(err.into());
        }

        info!(
            "Booking {} created for property {} ({} to {})",
            booking.id, property.id, booking.start_date, booking.end_date
        );
        Ok(booking)
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &Identity,
        patch: BookingPatch,
    ) -> Result<Booking, ApiError> {
        let mut booking = self.load(id).await?;
        self.authorize(&booking, actor).await?;
        if booking.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Cannot modify a booking that is {}",
                booking.status
            )));
        }
        if patch.guests == Some(0) {
            return Err(ApiError::validation("At least one guest is required"));
        }
        validate_special_requests(patch.special_requests.as_deref()).map_err(ApiError::Validation)?;

        let touches_dates = patch.touches_dates();
        let previous_nights = booking.nights();

        if let Some(start_date) = patch.start_date {
            booking.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            booking.end_date = end_date;
        }
        if let Some(guests) = patch.guests {
            booking.guests = guests;
        }
        if let Some(method) = patch.payment_method {
            booking.payment_method = method;
        }
        if let Some(requests) = patch.special_requests {
            booking.special_requests = Some(requests);
        }
        booking.updated_at = Utc::now();

        if !touches_dates {
            self.bookings.replace(&booking).await?;
            return Ok(booking);
        }

        validate_stay(booking.start_date, booking.end_date)?;
        let property = self.load_property(&booking.property).await?;
        if !self
            .availability
            .is_available(&property, booking.start_date, booking.end_date, Some(&booking.id))
            .await?
        {
            return Err(ApiError::conflict(DATES_TAKEN));
        }
        booking.total_price =
            PricingService::total_price(property.price, booking.start_date, booking.end_date);

        let nights = booking.nights();
        let (added, dropped) = night_changes(&previous_nights, &nights);

        // Nights are settled before the booking is written so that every
        // failure below can be rolled back to the stay as it was.
        self.bookings
            .release_nights(&booking.id, Some(&dropped))
            .await?;
        if let Err(err) = self
            .bookings
            .claim_nights(&booking.property, &booking.id, &added)
            .await
        {
            self.reclaim(&booking, &dropped).await;
            return Err(err.into());
        }
        let written = self.bookings.replace(&booking).await;
        if !matches!(written, Ok(true)) {
            let _ = self.bookings.release_nights(&booking.id, Some(&added)).await;
            self.reclaim(&booking, &dropped).await;
            return match written {
                Err(err) => Err(err.into()),
                _ => Err(ApiError::not_found("Booking")),
            };
        }

        info!(
            "Booking {} moved to {} - {}",
            booking.id, booking.start_date, booking.end_date
        );
        Ok(booking)
    }

    pub async fn cancel(
        &self,
        id: &str,
        actor: &Identity,
        reason: Option<String>,
    ) -> Result<Booking, ApiError> {
        let mut booking = self.load(id).await?;
        self.authorize(&booking, actor).await?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(ApiError::Conflict(format!(
                "Cannot cancel a booking that is {}",
                booking.status
            )));
        }

        let now = Utc::now();
        if !actor.is_admin() {
            let check_in = booking
                .start_date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
            let too_late = check_in.map_or(true, |at| {
                at - now < Duration::days(MIN_CANCELLATION_NOTICE_DAYS)
            });
            if too_late {
                return Err(ApiError::Validation(format!(
                    "Bookings cannot be cancelled less than {} days before check-in",
                    MIN_CANCELLATION_NOTICE_DAYS
                )));
            }
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancellation = Some(Cancellation {
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            cancelled_by: actor.user_id.clone(),
            cancelled_at: now,
        });
        booking.updated_at = now;

        // Nights go first: if the status write then fails they are put back,
        // and if the release fails nothing has been written yet.
        self.release_all(&booking).await?;
        match self.bookings.replace(&booking).await {
            Ok(true) => {}
            Ok(false) => return Err(ApiError::not_found("Booking")),
            Err(err) => {
                self.reclaim(&booking, &booking.nights()).await;
                return Err(err.into());
            }
        }
        info!("Booking {} cancelled by {}", booking.id, actor.user_id);
        Ok(booking)
    }

    async fn advance(
        &self,
        id: &str,
        actor: &Identity,
        next: BookingStatus,
    ) -> Result<Booking, ApiError> {
        let mut booking = self.load(id).await?;
        self.authorize_host(&booking, actor).await?;
        if !booking.status.can_transition_to(next) {
            return Err(ApiError::Conflict(format!(
                "Cannot move a booking from {} to {}",
                booking.status, next
            )));
        }

        let now = Utc::now();
        booking.status = next;
        match next {
            BookingStatus::CheckedIn => booking.checked_in_at = Some(now),
            BookingStatus::Completed => booking.checked_out_at = Some(now),
            _ => {}
        }
        booking.updated_at = now;

        self.bookings.replace(&booking).await?;
        info!("Booking {} is now {}", booking.id, next);
        Ok(booking)
    }

    pub async fn confirm(&self, id: &str, actor: &Identity) -> Result<Booking, ApiError> {
        self.advance(id, actor, BookingStatus::Confirmed).await
    }

    pub async fn check_in(&self, id: &str, actor: &Identity) -> Result<Booking, ApiError> {
        self.advance(id, actor, BookingStatus::CheckedIn).await
    }

    pub async fn check_out(&self, id: &str, actor: &Identity) -> Result<Booking, ApiError> {
        self.advance(id, actor, BookingStatus::Completed).await
    }

    pub async fn delete(&self, id: &str, actor: &Identity) -> Result<(), ApiError> {
        let booking = self.load(id).await?;
        self.authorize(&booking, actor).await?;
        self.release_all(&booking).await?;
        match self.bookings.delete(&booking.id).await {
            Ok(true) => {}
            Ok(false) => return Err(ApiError::not_found("Booking")),
            Err(err) => {
                if booking.status != BookingStatus::Cancelled {
                    self.reclaim(&booking, &booking.nights()).await;
                }
                return Err(err.into());
            }
        }
        info!("Booking {} deleted by {}", booking.id, actor.user_id);
        Ok(())
    }
}

/// Nights to claim and nights to release when a stay moves from `before`
/// to `after`.
fn night_changes(before: &[NaiveDate], after: &[NaiveDate]) -> (Vec<NaiveDate>, Vec<NaiveDate>) {
    let before_set: HashSet<&NaiveDate> = before.iter().collect();
    let after_set: HashSet<&NaiveDate> = after.iter().collect();
    let added = after
        .iter()
        .filter(|night| !before_set.contains(night))
        .copied()
        .collect();
    let dropped = before
        .iter()
        .filter(|night| !after_set.contains(night))
        .copied()
        .collect();
    (added, dropped)
}
