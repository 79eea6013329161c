
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type UserId = i64;
pub type ProductId = i64;
pub type MessageId = i64;
pub type OfferId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub seller_id: UserId,
}

/// A chat message as persisted. The wire name of `body` is `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub product_id: ProductId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(rename = "message")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A message the gateway has not stored yet. `created_at` is always set by the server.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub product_id: ProductId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown offer status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for OfferStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OfferStatus::Pending),
            "accepted" => Ok(OfferStatus::Accepted),
            "rejected" => Ok(OfferStatus::Rejected),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: f64,
    pub status: OfferStatus,
}

/// An offer row before it has been given an id.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: f64,
}

/// An offer joined with its buyer and product, as listed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDetails {
    #[serde(flatten)]
    pub offer: Offer,
    pub buyer_name: String,
    pub product_name: String,
    pub product_description: String,
    pub price: f64,
}
