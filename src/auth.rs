
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{GatewayError, PersistenceGateway};
use crate::models::{User, UserId};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user id, as a string.
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

/// Who a request or a live connection acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("identity store unavailable: {0}")]
    ServiceUnavailable(#[from] GatewayError),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Checks credentials against stored bcrypt hashes and issues/reads the
/// signed identity tokens used by both the REST and real-time paths.
pub struct IdentityVerifier {
    gateway: Arc<dyn PersistenceGateway>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl IdentityVerifier {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        secret: &str,
        token_ttl_secs: i64,
        bcrypt_cost: u32,
    ) -> Self {
        IdentityVerifier {
            gateway,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::seconds(token_ttl_secs),
            bcrypt_cost,
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidRegistration(
                "name, email and password are required".into(),
            ));
        }

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        self.gateway
            .insert_user(name, email, &password_hash)
            .await
            .map_err(|e| match e {
                GatewayError::Conflict(msg) => AuthError::InvalidRegistration(msg),
                other => AuthError::ServiceUnavailable(other),
            })
    }

    pub async fn verify(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let user = self
            .gateway
            .find_user_by_email(credentials.email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches = verify_password(&credentials.password, &user.password_hash).unwrap_or_else(|e| {
            warn!("stored password hash for user {} is unreadable: {}", user.id, e);
            false
        });
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Identity {
            user_id: user.id,
            display_name: user.name,
        })
    }

    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let expiration = (Utc::now() + self.token_ttl).timestamp().max(0);

        let claims = Claims {
            sub: identity.user_id.to_string(),
            name: identity.display_name.clone(),
            exp: expiration as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)?;

        let user_id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Identity {
            user_id,
            display_name: claims.name,
        })
    }

    /// Looks a user up by id; used when a live connection authenticates with a bare user id.
    pub async fn resolve_user(&self, user_id: UserId) -> Result<Identity, AuthError> {
        let user = self
            .gateway
            .find_user(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(Identity {
            user_id: user.id,
            display_name: user.name,
        })
    }
}
