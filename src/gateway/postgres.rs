
use async_trait::async_trait;

use crate::db::DbPool;
use crate::models::{
    Message, NewMessage, NewOffer, Offer, OfferDetails, OfferId, OfferStatus, Product, ProductId,
    User, UserId,
};

use super::{Catalog, GatewayError, GatewayResult, PersistenceGateway};

const OFFER_COLUMNS: &str = "id, product_id, buyer_id, seller_id, amount, status";

const OFFER_DETAILS_SELECT: &str = "
    SELECT offers.id, offers.product_id, offers.buyer_id, offers.seller_id, offers.amount,
           offers.status, users.name AS buyer_name, products.name AS product_name,
           products.description AS product_description, products.price
    FROM offers
    JOIN users ON offers.buyer_id = users.id
    JOIN products ON offers.product_id = products.id";

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: OfferId,
    product_id: ProductId,
    buyer_id: UserId,
    seller_id: UserId,
    amount: f64,
    status: String,
}

impl TryFrom<OfferRow> for Offer {
    type Error = GatewayError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OfferStatus>()
            .map_err(|e| GatewayError::Corrupt(format!("offer {}: {}", row.id, e)))?;
        Ok(Offer {
            id: row.id,
            product_id: row.product_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            amount: row.amount,
            status,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OfferDetailsRow {
    #[sqlx(flatten)]
    offer: OfferRow,
    buyer_name: String,
    product_name: String,
    product_description: String,
    price: f64,
}

impl TryFrom<OfferDetailsRow> for OfferDetails {
    type Error = GatewayError;

    fn try_from(row: OfferDetailsRow) -> Result<Self, Self::Error> {
        Ok(OfferDetails {
            offer: row.offer.try_into()?,
            buyer_name: row.buyer_name,
            product_name: row.product_name,
            product_description: row.product_description,
            price: row.price,
        })
    }
}

fn into_details(rows: Vec<OfferDetailsRow>) -> GatewayResult<Vec<OfferDetails>> {
    rows.into_iter().map(OfferDetails::try_from).collect()
}

/// [`PersistenceGateway`] over the shared Postgres pool.
#[derive(Clone)]
pub struct PgGateway {
    pool: DbPool,
}

impl PgGateway {
    pub fn new(pool: DbPool) -> Self {
        PgGateway { pool }
    }
}

#[async_trait]
impl Catalog for PgGateway {
    async fn find_product(&self, id: ProductId) -> GatewayResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, seller_id FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    async fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> GatewayResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3)
             RETURNING id, name, email, password_hash",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                GatewayError::Conflict(format!("email {} is already registered", email))
            }
            other => other.into(),
        })
    }

    async fn find_user(&self, id: UserId) -> GatewayResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> GatewayResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert_message(&self, message: NewMessage) -> GatewayResult<Message> {
        let stored = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (product_id, sender_id, receiver_id, body, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, product_id, sender_id, receiver_id, body, created_at",
        )
        .bind(message.product_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.body)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn conversation(
        &self,
        product_id: ProductId,
        user_a: UserId,
        user_b: UserId,
    ) -> GatewayResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, product_id, sender_id, receiver_id, body, created_at
             FROM messages
             WHERE product_id = $1
               AND ((sender_id = $2 AND receiver_id = $3) OR (sender_id = $3 AND receiver_id = $2))
             ORDER BY created_at ASC, id ASC",
        )
        .bind(product_id)
        .bind(user_a)
        .bind(user_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn insert_offer(&self, offer: NewOffer) -> GatewayResult<Offer> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "INSERT INTO offers (product_id, buyer_id, seller_id, amount, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            OFFER_COLUMNS
        ))
        .bind(offer.product_id)
        .bind(offer.buyer_id)
        .bind(offer.seller_id)
        .bind(offer.amount)
        .bind(OfferStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_offer(&self, id: OfferId) -> GatewayResult<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {} FROM offers WHERE id = $1",
            OFFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Offer::try_from).transpose()
    }

    async fn pending_offers_for_buyer(&self, buyer_id: UserId) -> GatewayResult<Vec<OfferDetails>> {
        let rows = sqlx::query_as::<_, OfferDetailsRow>(&format!(
            "{} WHERE offers.buyer_id = $1 AND offers.status = $2",
            OFFER_DETAILS_SELECT
        ))
        .bind(buyer_id)
        .bind(OfferStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        into_details(rows)
    }

    async fn offers_for_seller(&self, seller_id: UserId) -> GatewayResult<Vec<OfferDetails>> {
        let rows = sqlx::query_as::<_, OfferDetailsRow>(&format!(
            "{} WHERE offers.seller_id = $1 ORDER BY offers.id",
            OFFER_DETAILS_SELECT
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        into_details(rows)
    }

    async fn offers_for_product(&self, product_id: ProductId) -> GatewayResult<Vec<OfferDetails>> {
        let rows = sqlx::query_as::<_, OfferDetailsRow>(&format!(
            "{} WHERE offers.product_id = $1 ORDER BY offers.id",
            OFFER_DETAILS_SELECT
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        into_details(rows)
    }

    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        to: OfferStatus,
    ) -> GatewayResult<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers SET status = $1, updated_at = now()
             WHERE id = $2 AND status = $3
             RETURNING {}",
            OFFER_COLUMNS
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Offer::try_from).transpose()
    }
}
