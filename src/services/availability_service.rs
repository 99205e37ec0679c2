use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::store::BookingStore;
use crate::error::ApiError;
use crate::models::booking::AvailabilityReport;
use crate::models::property::Property;
use crate::services::pricing_service::PricingService;

/// Read-side answer to "can these dates be booked". The write side is the
/// per-night claim in the booking store.
#[derive(Clone)]
pub struct AvailabilityChecker {
    bookings: Arc<dyn BookingStore>,
}

impl AvailabilityChecker {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
        if start >= end {
            return Err(ApiError::validation("End date must be after start date"));
        }
        Ok(())
    }

    /// `exclude` lets a booking being edited ignore its own reservation.
    pub async fn is_available(
        &self,
        property: &Property,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<&str>,
    ) -> Result<bool, ApiError> {
        Self::validate_range(start, end)?;

        if !property.is_available {
            return Ok(false);
        }
        if start < property.features.available_from {
            return Ok(false);
        }
        if let Some(available_to) = property.features.available_to {
            if end > available_to {
                return Ok(false);
            }
        }

        let conflicts = self
            .bookings
            .find_overlapping(&property.id, start, end, exclude)
            .await?;
        Ok(conflicts.is_empty())
    }

    pub async fn report(
        &self,
        property: &Property,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AvailabilityReport, ApiError> {
        let available = self.is_available(property, start, end, None).await?;
        Ok(AvailabilityReport {
            property: property.id.clone(),
            start_date: start,
            end_date: end,
            available,
            nights: PricingService::nights(start, end),
            total_price: PricingService::total_price(property.price, start, end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::booking::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
    use crate::models::property::{Address, Features, Rating};
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn property() -> Property {
        Property {
            id: "p1".into(),
            title: "Cabin".into(),
            description: "Quiet cabin".into(),
            price: 200.0,
            address: Address {
                street: "1 Forest Rd".into(),
                city: "Knysna".into(),
                state: None,
                zip_code: None,
                country: None,
            },
            features: Features {
                bedrooms: 2,
                bathrooms: 1,
                parking: true,
                furnished: true,
                available_from: date("2025-01-01"),
                available_to: Some(date("2025-12-31")),
            },
            images: vec![],
            is_available: true,
            created_by: "owner".into(),
            rating: Rating::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(id: &str, start: &str, end: &str, status: BookingStatus) -> Booking {
        Booking {
            id: id.into(),
            property: "p1".into(),
            user: "guest".into(),
            start_date: date(start),
            end_date: date(end),
            guests: 2,
            total_price: 0.0,
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Eft,
            special_requests: None,
            payment_proof: None,
            cancellation: None,
            checked_in_at: None,
            checked_out_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn checker_with(bookings: Vec<Booking>) -> AvailabilityChecker {
        let store = Arc::new(MemoryStore::new());
        for b in &bookings {
            BookingStore::insert(store.as_ref(), b).await.unwrap();
        }
        AvailabilityChecker::new(store)
    }

    #[actix_rt::test]
    async fn overlapping_live_booking_blocks_dates() {
        let checker =
            checker_with(vec![booking("b1", "2025-06-01", "2025-06-07", BookingStatus::Confirmed)])
                .await;
        let p = property();
        assert!(!checker
            .is_available(&p, date("2025-06-05"), date("2025-06-10"), None)
            .await
            .unwrap());
        // back-to-back stays share a turnover day
        assert!(checker
            .is_available(&p, date("2025-06-07"), date("2025-06-10"), None)
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn cancelled_bookings_and_self_are_ignored() {
        let checker = checker_with(vec![
            booking("b1", "2025-06-01", "2025-06-07", BookingStatus::Cancelled),
            booking("b2", "2025-07-01", "2025-07-07", BookingStatus::Pending),
        ])
        .await;
        let p = property();
        assert!(checker
            .is_available(&p, date("2025-06-01"), date("2025-06-07"), None)
            .await
            .unwrap());
        assert!(checker
            .is_available(&p, date("2025-07-01"), date("2025-07-07"), Some("b2"))
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn listing_window_and_flag_are_respected() {
        let checker = checker_with(vec![]).await;
        let mut p = property();
        assert!(!checker
            .is_available(&p, date("2024-12-30"), date("2025-01-02"), None)
            .await
            .unwrap());
        assert!(!checker
            .is_available(&p, date("2025-12-30"), date("2026-01-02"), None)
            .await
            .unwrap());
        p.is_available = false;
        assert!(!checker
            .is_available(&p, date("2025-03-01"), date("2025-03-02"), None)
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn empty_or_inverted_ranges_are_invalid() {
        let checker = checker_with(vec![]).await;
        let p = property();
        let err = checker
            .is_available(&p, date("2025-06-05"), date("2025-06-05"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[actix_rt::test]
    async fn report_prices_the_stay() {
        let checker = checker_with(vec![]).await;
        let report = checker
            .report(&property(), date("2025-06-01"), date("2025-06-07"))
            .await
            .unwrap();
        assert!(report.available);
        assert_eq!(report.nights, 6);
        assert_eq!(report.total_price, 1200.0);
    }
}
