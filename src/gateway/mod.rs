//! Durable storage seam.
//!
//! Every component receives an `Arc<dyn PersistenceGateway>` at construction;
//! nothing reaches the database through global state. [`Catalog`] is the
//! read-only product view, kept separate so the offer ledger's seller lookup
//! is explicit about where ownership comes from.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Message, NewMessage, NewOffer, Offer, OfferDetails, OfferId, OfferStatus, Product, ProductId,
    User, UserId,
};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                GatewayError::Unavailable(e.to_string())
            }
            other => GatewayError::Database(other),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, id: ProductId) -> GatewayResult<Option<Product>>;
}

#[async_trait]
pub trait PersistenceGateway: Catalog {
    async fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> GatewayResult<User>;

    async fn find_user(&self, id: UserId) -> GatewayResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> GatewayResult<Option<User>>;

    async fn insert_message(&self, message: NewMessage) -> GatewayResult<Message>;

    /// Messages between two users about one product, oldest first.
    async fn conversation(
        &self,
        product_id: ProductId,
        user_a: UserId,
        user_b: UserId,
    ) -> GatewayResult<Vec<Message>>;

    async fn insert_offer(&self, offer: NewOffer) -> GatewayResult<Offer>;

    async fn find_offer(&self, id: OfferId) -> GatewayResult<Option<Offer>>;

    async fn pending_offers_for_buyer(&self, buyer_id: UserId) -> GatewayResult<Vec<OfferDetails>>;

    async fn offers_for_seller(&self, seller_id: UserId) -> GatewayResult<Vec<OfferDetails>>;

    async fn offers_for_product(&self, product_id: ProductId) -> GatewayResult<Vec<OfferDetails>>;

    /// Compare-and-set on the status column: only writes `to` while the stored
    /// status still equals `from`. Returns `None` if the row is missing or
    /// its status moved on.
    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        to: OfferStatus,
    ) -> GatewayResult<Option<Offer>>;
}
