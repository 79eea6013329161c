//! Offer lifecycle: `pending -> accepted | rejected`, never back.
//!
//! The seller of a new offer is always looked up in the [`Catalog`]; status
//! changes go through the gateway's compare-and-set so two racing updates
//! cannot both leave `pending`.

use std::sync::Arc;

use log::info;
use serde_json::Value;
use thiserror::Error;

use crate::gateway::{Catalog, GatewayError, PersistenceGateway};
use crate::models::{NewOffer, Offer, OfferDetails, OfferId, OfferStatus, Product, ProductId, UserId};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid offer amount")]
    InvalidAmount,

    #[error("Product not found")]
    ProductNotFound(ProductId),

    #[error("Offer not found")]
    NotFound(OfferId),

    #[error("Offer {id} is already {status}")]
    InvalidTransition { id: OfferId, status: OfferStatus },

    #[error("`{0}` is not a status an offer can move to")]
    InvalidStatus(String),

    #[error("offer storage failed: {0}")]
    Persistence(#[from] GatewayError),
}

/// Reads an amount sent as a JSON number or a numeric string.
pub fn parse_amount(value: &Value) -> Result<f64, LedgerError> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(LedgerError::InvalidAmount)?;

    check_amount(amount)
}

fn check_amount(amount: f64) -> Result<f64, LedgerError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(LedgerError::InvalidAmount)
    }
}

/// Parses the status a client asks an offer to move to.
pub fn parse_target_status(raw: &str) -> Result<OfferStatus, LedgerError> {
    match raw.parse::<OfferStatus>() {
        Ok(status) if status.is_terminal() => Ok(status),
        _ => Err(LedgerError::InvalidStatus(raw.to_owned())),
    }
}

pub struct OfferLedger {
    gateway: Arc<dyn PersistenceGateway>,
    catalog: Arc<dyn Catalog>,
}

impl OfferLedger {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, catalog: Arc<dyn Catalog>) -> Self {
        OfferLedger { gateway, catalog }
    }

    pub async fn create(
        &self,
        product_id: ProductId,
        buyer_id: UserId,
        amount: f64,
    ) -> Result<Offer, LedgerError> {
        let amount = check_amount(amount)?;
        let product = self.product(product_id).await?;

        let offer = self
            .gateway
            .insert_offer(NewOffer {
                product_id,
                buyer_id,
                seller_id: product.seller_id,
                amount,
            })
            .await?;

        info!(
            "offer {} of {:.2} on product {} from buyer {} to seller {}",
            offer.id, offer.amount, product_id, buyer_id, offer.seller_id
        );
        Ok(offer)
    }

    pub async fn product(&self, product_id: ProductId) -> Result<Product, LedgerError> {
        self.catalog
            .find_product(product_id)
            .await?
            .ok_or(LedgerError::ProductNotFound(product_id))
    }

    pub async fn find(&self, offer_id: OfferId) -> Result<Offer, LedgerError> {
        self.gateway
            .find_offer(offer_id)
            .await?
            .ok_or(LedgerError::NotFound(offer_id))
    }

    pub async fn list_pending_for_buyer(&self, buyer_id: UserId) -> Result<Vec<OfferDetails>, LedgerError> {
        Ok(self.gateway.pending_offers_for_buyer(buyer_id).await?)
    }

    pub async fn list_for_seller(&self, seller_id: UserId) -> Result<Vec<OfferDetails>, LedgerError> {
        Ok(self.gateway.offers_for_seller(seller_id).await?)
    }

    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<OfferDetails>, LedgerError> {
        Ok(self.gateway.offers_for_product(product_id).await?)
    }

    pub async fn update_status(
        &self,
        offer_id: OfferId,
        new_status: OfferStatus,
    ) -> Result<Offer, LedgerError> {
        if !new_status.is_terminal() {
            return Err(LedgerError::InvalidStatus(new_status.to_string()));
        }

        let current = self.find(offer_id).await?;
        if current.status.is_terminal() {
            return Err(LedgerError::InvalidTransition { id: offer_id, status: current.status });
        }

        match self
            .gateway
            .transition_offer(offer_id, OfferStatus::Pending, new_status)
            .await?
        {
            Some(updated) => {
                info!("offer {} {}", offer_id, updated.status);
                Ok(updated)
            }
            // Lost a race with another update; report what won.
            None => match self.gateway.find_offer(offer_id).await? {
                Some(offer) => Err(LedgerError::InvalidTransition { id: offer_id, status: offer.status }),
                None => Err(LedgerError::NotFound(offer_id)),
            },
        }
    }
}
