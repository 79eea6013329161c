
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpResponse, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use log::error;
use std::{
    future::{ready, Ready},
    rc::Rc,
    task::{Context, Poll},
};

use crate::auth::{AuthError, IdentityVerifier};
use crate::error::ApiError;

/// Requires a valid `Authorization: Bearer <token>` header and stores the
/// resulting [`Identity`](crate::auth::Identity) in the request extensions.
pub struct Authentication;

impl<S> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware { service: Rc::new(service) }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|token| token.trim().to_owned())
}

impl<S> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            let verifier = match req.app_data::<web::Data<IdentityVerifier>>() {
                Some(verifier) => verifier.clone(),
                None => {
                    error!("identity verifier is not registered as app data");
                    return Ok(req.into_response(HttpResponse::InternalServerError().finish()));
                }
            };

            let identity = bearer_token(&req)
                .ok_or(AuthError::InvalidToken)
                .and_then(|token| verifier.verify_token(&token));

            match identity {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    svc.call(req).await
                }
                Err(e) => Ok(req.into_response(ApiError::from(e).error_response())),
            }
        })
    }
}
