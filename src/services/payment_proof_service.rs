use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::db::store::BookingStore;
use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::booking::{Booking, BookingStatus, PaymentProof, PaymentStatus};
use crate::services::image_service::{release_quietly, validate_image, MediaStore, MediaUpload};

/// Attaches proof-of-payment documents to bookings and lets admins verify
/// them. Verification settles the payment and confirms a pending booking.
#[derive(Clone)]
pub struct PaymentProofTracker {
    bookings: Arc<dyn BookingStore>,
    media: Arc<dyn MediaStore>,
    max_upload_bytes: usize,
}

impl PaymentProofTracker {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        media: Arc<dyn MediaStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            bookings,
            media,
            max_upload_bytes,
        }
    }

    async fn load(&self, id: &str) -> Result<Booking, ApiError> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Booking"))
    }

    pub async fn attach_proof(
        &self,
        booking_id: &str,
        actor: &Identity,
        upload: MediaUpload,
    ) -> Result<Booking, ApiError> {
        let mut booking = self.load(booking_id).await?;
        if !actor.can_manage(&booking.user) {
            return Err(ApiError::forbidden(
                "Only the guest can upload payment proof for this booking",
            ));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(ApiError::conflict(
                "Cannot upload payment proof for a cancelled booking",
            ));
        }
        validate_image(&upload, self.max_upload_bytes)?;

        let stored = self
            .media
            .upload(upload, &format!("payment-proofs/{}", booking.id))
            .await?;

        // an admin uploading on the guest's behalf counts as verification
        let now = Utc::now();
        let verified = actor.is_admin();
        let previous = booking.payment_proof.replace(PaymentProof {
            url: stored.url,
            remote_id: stored.remote_id.clone(),
            verified,
            verified_by: verified.then(|| actor.user_id.clone()),
            verified_at: verified.then_some(now),
            uploaded_at: now,
        });
        booking.payment_status = if verified {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };
        booking.updated_at = now;

        if let Err(err) = self.bookings.replace(&booking).await {
            release_quietly(self.media.as_ref(), &stored.remote_id).await;
            return Err(err.into());
        }
        if let Some(previous) = previous {
            release_quietly(self.media.as_ref(), &previous.remote_id).await;
        }

        info!("Payment proof attached to booking {}", booking.id);
        Ok(booking)
    }

    pub async fn verify(&self, booking_id: &str, actor: &Identity) -> Result<Booking, ApiError> {
        if !actor.is_admin() {
            return Err(ApiError::forbidden("Only admins can verify payments"));
        }
        let mut booking = self.load(booking_id).await?;
        let now = Utc::now();
        let proof = booking
            .payment_proof
            .as_mut()
            .ok_or_else(|| ApiError::validation("No payment proof has been uploaded"))?;
        proof.verified = true;
        proof.verified_by = Some(actor.user_id.clone());
        proof.verified_at = Some(now);

        booking.payment_status = PaymentStatus::Paid;
        if booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Confirmed;
        }
        booking.updated_at = now;

        self.bookings.replace(&booking).await?;
        info!("Payment for booking {} verified by {}", booking.id, actor.user_id);
        Ok(booking)
    }
}
