//! In-process gateway used by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{
    Message, NewMessage, NewOffer, Offer, OfferDetails, OfferId, OfferStatus, Product, ProductId,
    User, UserId,
};

use super::{Catalog, GatewayError, GatewayResult, PersistenceGateway};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    messages: Vec<Message>,
    offers: Vec<Offer>,
}

#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`GatewayError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn seed_user(&self, id: UserId, name: &str, email: &str, password_hash: &str) {
        self.tables.lock().unwrap().users.push(User {
            id,
            name: name.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
        });
    }

    pub fn seed_product(&self, id: ProductId, name: &str, price: f64, seller_id: UserId) {
        self.tables.lock().unwrap().products.push(Product {
            id,
            name: name.to_owned(),
            description: format!("{} description", name),
            price,
            seller_id,
        });
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tables.lock().unwrap().messages.clone()
    }

    pub fn offers(&self) -> Vec<Offer> {
        self.tables.lock().unwrap().offers.clone()
    }

    fn check_writable(&self) -> GatewayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn details(tables: &Tables, offer: &Offer) -> Option<OfferDetails> {
        let buyer = tables.users.iter().find(|u| u.id == offer.buyer_id)?;
        let product = tables.products.iter().find(|p| p.id == offer.product_id)?;
        Some(OfferDetails {
            offer: offer.clone(),
            buyer_name: buyer.name.clone(),
            product_name: product.name.clone(),
            product_description: product.description.clone(),
            price: product.price,
        })
    }

    fn select_details(&self, keep: impl Fn(&Offer) -> bool) -> Vec<OfferDetails> {
        let tables = self.tables.lock().unwrap();
        tables
            .offers
            .iter()
            .filter(|o| keep(o))
            .filter_map(|o| Self::details(&tables, o))
            .collect()
    }
}

#[async_trait]
impl Catalog for MemoryGateway {
    async fn find_product(&self, id: ProductId) -> GatewayResult<Option<Product>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> GatewayResult<User> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(GatewayError::Conflict(format!("email {} is already registered", email)));
        }
        let user = User {
            id: tables.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            name: name.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> GatewayResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> GatewayResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_message(&self, message: NewMessage) -> GatewayResult<Message> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = Message {
            id: tables.messages.len() as i64 + 1,
            product_id: message.product_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body,
            created_at: message.created_at,
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }

    async fn conversation(
        &self,
        product_id: ProductId,
        user_a: UserId,
        user_b: UserId,
    ) -> GatewayResult<Vec<Message>> {
        let tables = self.tables.lock().unwrap();
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.product_id == product_id)
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn insert_offer(&self, offer: NewOffer) -> GatewayResult<Offer> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = Offer {
            id: tables.offers.len() as i64 + 1,
            product_id: offer.product_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            amount: offer.amount,
            status: OfferStatus::Pending,
        };
        tables.offers.push(stored.clone());
        Ok(stored)
    }

    async fn find_offer(&self, id: OfferId) -> GatewayResult<Option<Offer>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.offers.iter().find(|o| o.id == id).cloned())
    }

    async fn pending_offers_for_buyer(&self, buyer_id: UserId) -> GatewayResult<Vec<OfferDetails>> {
        Ok(self.select_details(|o| o.buyer_id == buyer_id && o.status == OfferStatus::Pending))
    }

    async fn offers_for_seller(&self, seller_id: UserId) -> GatewayResult<Vec<OfferDetails>> {
        Ok(self.select_details(|o| o.seller_id == seller_id))
    }

    async fn offers_for_product(&self, product_id: ProductId) -> GatewayResult<Vec<OfferDetails>> {
        Ok(self.select_details(|o| o.product_id == product_id))
    }

    async fn transition_offer(
        &self,
        id: OfferId,
        from: OfferStatus,
        to: OfferStatus,
    ) -> GatewayResult<Option<Offer>> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.offers.iter_mut().find(|o| o.id == id) {
            Some(offer) if offer.status == from => {
                offer.status = to;
                Ok(Some(offer.clone()))
            }
            _ => Ok(None),
        }
    }
}
