use actix_web::web;

use crate::middleware::role_auth::RequireRole;
use crate::models::user::UserRole;

pub mod users;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(RequireRole::new(UserRole::Admin))
            .route("/users", web::get().to(users::list_users))
            .route("/users/{id}/role", web::put().to(users::update_user_role)),
    );
}
