
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Credentials, IdentityVerifier};
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct RegisterPayload {
    name: String,
    email: String,
    password: String,
}

pub async fn register(
    verifier: web::Data<IdentityVerifier>,
    payload: web::Json<RegisterPayload>,
) -> ApiResult<HttpResponse> {
    let user = verifier
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn login(
    verifier: web::Data<IdentityVerifier>,
    payload: web::Json<Credentials>,
) -> ApiResult<HttpResponse> {
    let identity = verifier.verify(&payload).await?;
    let token = verifier.issue_token(&identity)?;

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "userId": identity.user_id,
        "name": identity.display_name,
    })))
}
