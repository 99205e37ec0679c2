use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::booking::{BookingPatch, BookingQuery, CancelRequest, NewBooking};
use crate::models::response::ApiResponse;
use crate::routes::upload::read_file;
use crate::state::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::get().to(list_bookings))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}", web::put().to(update_booking))
            .route("/{id}", web::delete().to(delete_booking))
            .route("/{id}/cancel", web::put().to(cancel_booking))
            .route("/{id}/confirm", web::put().to(confirm_booking))
            .route("/{id}/checkin", web::put().to(check_in))
            .route("/{id}/checkout", web::put().to(check_out))
            .route("/{id}/payment-proof", web::put().to(upload_payment_proof))
            .route("/{id}/verify-payment", web::put().to(verify_payment)),
    );
}

pub async fn list_bookings(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<BookingQuery>,
) -> Result<HttpResponse, ApiError> {
    let bookings = state
        .bookings
        .list(&identity, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::list(bookings)))
}

pub async fn get_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = state.bookings.get(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

/// `POST /properties/{id}/bookings`
pub async fn create_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<NewBooking>,
) -> Result<HttpResponse, ApiError> {
    let booking = state
        .bookings
        .create(&path, &identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(booking)))
}

pub async fn update_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<BookingPatch>,
) -> Result<HttpResponse, ApiError> {
    let booking = state
        .bookings
        .update(&path, &identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn delete_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.bookings.delete(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Booking deleted")))
}

/// The body is optional; `{ "reason": "..." }` is recorded when present.
pub async fn cancel_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: Option<web::Json<CancelRequest>>,
) -> Result<HttpResponse, ApiError> {
    let reason = input.and_then(|body| body.into_inner().reason);
    let booking = state.bookings.cancel(&path, &identity, reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn confirm_booking(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = state.bookings.confirm(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn check_in(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = state.bookings.check_in(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn check_out(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = state.bookings.check_out(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn upload_payment_proof(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_file(payload, "proof", state.max_upload_bytes).await?;
    let booking = state
        .payments
        .attach_proof(&path, &identity, upload)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}

pub async fn verify_payment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = state.payments.verify(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(booking)))
}
