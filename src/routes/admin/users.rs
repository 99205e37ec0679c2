use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::models::response::ApiResponse;
use crate::models::user::UpdateRoleRequest;
use crate::state::AppState;

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = state.accounts.list_users().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::list(users)))
}

pub async fn update_user_role(
    state: web::Data<AppState>,
    path: web::Path<String>,
    input: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = state.accounts.set_role(&path, input.role).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user)))
}
