use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::warn;

use crate::error::ApiError;
use crate::middleware::auth_context::{identify, Identity};
use crate::models::user::UserRole;
use crate::state::AppState;

/// Rejects requests whose caller does not hold `required_role`. Admins
/// always pass. The role is read from the user record rather than the
/// token, so a role change applies to tokens already issued. Rejections
/// are rendered as responses here; the resolved identity is stashed for
/// handler extractors.
pub struct RequireRole {
    required_role: UserRole,
}

impl RequireRole {
    pub fn new(role: UserRole) -> Self {
        RequireRole {
            required_role: role,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireRoleService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service: Rc::new(service),
            required_role: self.required_role,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: Rc<S>,
    required_role: UserRole,
}

/// The token's identity with its role refreshed from the user store.
async fn current_identity(req: &ServiceRequest) -> Result<Identity, ApiError> {
    let mut identity = identify(req.request())?;
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("application state not registered".to_string()))?;
    identity.role = state.accounts.current_role(&identity.user_id).await?;
    Ok(identity)
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_role = self.required_role;

        Box::pin(async move {
            let identity = match current_identity(&req).await {
                Ok(identity) => identity,
                Err(err) => return Ok(req.error_response(err).map_into_right_body()),
            };

            if identity.role != required_role && !identity.is_admin() {
                warn!(
                    "User {} with role {} denied access to {}",
                    identity.user_id,
                    identity.role,
                    req.path()
                );
                let err = ApiError::forbidden(format!(
                    "User role {} is not authorized to access this route",
                    identity.role
                ));
                return Ok(req.error_response(err).map_into_right_body());
            }

            req.extensions_mut().insert(identity);
            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}
