use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::response::ApiResponse;
use crate::models::review::{NewReview, ReplyRequest, ReviewPatch, ReviewQuery};
use crate::state::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .route("", web::get().to(list_reviews))
            .route("/{id}", web::get().to(get_review))
            .route("/{id}", web::put().to(update_review))
            .route("/{id}", web::delete().to(delete_review))
            .route("/{id}/reply", web::put().to(reply_to_review))
            .route("/{id}/reply", web::delete().to(remove_reply)),
    );
}

pub async fn list_reviews(
    state: web::Data<AppState>,
    query: web::Query<ReviewQuery>,
) -> Result<HttpResponse, ApiError> {
    let reviews = state.reviews.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::list(reviews)))
}

/// `GET /properties/{id}/reviews`
pub async fn property_reviews(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let property = state.properties.get(&path).await?;
    let query = ReviewQuery {
        property: Some(property.id),
        user: None,
    };
    let reviews = state.reviews.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::list(reviews)))
}

/// `POST /properties/{id}/reviews`
pub async fn add_review(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<NewReview>,
) -> Result<HttpResponse, ApiError> {
    let review = state
        .reviews
        .add(&path, &identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(review)))
}

pub async fn get_review(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let review = state.reviews.get(&path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(review)))
}

pub async fn update_review(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<ReviewPatch>,
) -> Result<HttpResponse, ApiError> {
    let review = state
        .reviews
        .update(&path, &identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(review)))
}

pub async fn delete_review(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.reviews.delete(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Review deleted")))
}

pub async fn reply_to_review(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<ReplyRequest>,
) -> Result<HttpResponse, ApiError> {
    let review = state
        .reviews
        .reply(&path, &identity, input.into_inner().text)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(review)))
}

pub async fn remove_reply(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let review = state.reviews.remove_reply(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(review)))
}
