use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::middleware::auth_context::Identity;
use crate::models::response::ApiResponse;
use crate::models::user::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::state::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(me))
            .route("/forgot-password", web::post().to(forgot_password))
            .route("/reset-password/{token}", web::put().to(reset_password)),
    );
}

pub async fn register(
    state: web::Data<AppState>,
    input: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = state.accounts.register(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(session)))
}

pub async fn login(
    state: web::Data<AppState>,
    input: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = state.accounts.login(&input.email, &input.password).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(session)))
}

pub async fn me(state: web::Data<AppState>, identity: Identity) -> Result<HttpResponse, ApiError> {
    let profile = state.accounts.me(&identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(profile)))
}

pub async fn forgot_password(
    state: web::Data<AppState>,
    input: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    state.accounts.forgot_password(&input.email).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message(
        "If that email is registered, a reset link has been sent",
    )))
}

pub async fn reset_password(
    state: web::Data<AppState>,
    path: web::Path<String>,
    input: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = state
        .accounts
        .reset_password(&path, &input.password)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(session)))
}
