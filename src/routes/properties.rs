use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::booking::AvailabilityQuery;
use crate::models::property::{NewProperty, PropertyPatch, PropertyQuery};
use crate::models::response::ApiResponse;
use crate::routes::upload::read_file;
use crate::state::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/properties")
            .route("", web::get().to(list_properties))
            .route("", web::post().to(create_property))
            .route("/{id}", web::get().to(get_property))
            .route("/{id}", web::put().to(update_property))
            .route("/{id}", web::delete().to(delete_property))
            .route("/{id}/availability", web::get().to(check_availability))
            .route("/{id}/photo", web::put().to(upload_photo))
            .route("/{id}/photo/{photo_id}", web::delete().to(delete_photo))
            .route(
                "/{id}/photo/{photo_id}/featured",
                web::put().to(set_featured_photo),
            )
            .route(
                "/{id}/bookings",
                web::post().to(crate::routes::bookings::create_booking),
            )
            .route(
                "/{id}/reviews",
                web::get().to(crate::routes::reviews::property_reviews),
            )
            .route(
                "/{id}/reviews",
                web::post().to(crate::routes::reviews::add_review),
            ),
    );
}

pub async fn list_properties(
    state: web::Data<AppState>,
    query: web::Query<PropertyQuery>,
) -> Result<HttpResponse, ApiError> {
    let properties = state.properties.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::list(properties)))
}

pub async fn get_property(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let property = state.properties.get(&path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(property)))
}

pub async fn create_property(
    state: web::Data<AppState>,
    identity: Identity,
    input: web::Json<NewProperty>,
) -> Result<HttpResponse, ApiError> {
    let property = state
        .properties
        .create(&identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(property)))
}

pub async fn update_property(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    input: web::Json<PropertyPatch>,
) -> Result<HttpResponse, ApiError> {
    let property = state
        .properties
        .update(&path, &identity, input.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(property)))
}

pub async fn delete_property(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.properties.delete(&path, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Property deleted")))
}

pub async fn check_availability(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let property = state.properties.get(&path).await?;
    let report = state
        .availability
        .report(&property, query.start_date, query.end_date)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

pub async fn upload_photo(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_file(payload, "image", state.max_upload_bytes).await?;
    let property = state
        .properties
        .add_image(&path, &identity, upload)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(property)))
}

pub async fn delete_photo(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, photo_id) = path.into_inner();
    let property = state
        .properties
        .remove_image(&id, &photo_id, &identity)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(property)))
}

pub async fn set_featured_photo(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, photo_id) = path.into_inner();
    let property = state
        .properties
        .set_featured(&id, &photo_id, &identity)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(property)))
}
