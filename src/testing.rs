//! Fixtures shared by the unit tests.

use std::sync::Arc;

use actix::prelude::*;
use actix_web::web;
use chrono::Utc;

use crate::auth::{hash_password, Identity, IdentityVerifier};
use crate::channel::ConversationChannel;
use crate::gateway::memory::MemoryGateway;
use crate::handlers;
use crate::ledger::OfferLedger;
use crate::models::{Message as ChatMessage, MessageId, ProductId, UserId};
use crate::ws::{ChatServer, WsMessage};

pub const BUYER: UserId = 7;
pub const OTHER_BUYER: UserId = 8;
pub const SELLER: UserId = 9;
pub const PRODUCT: ProductId = 3;
/// Owned by [`OTHER_BUYER`].
pub const OTHER_PRODUCT: ProductId = 4;

pub const BUYER_EMAIL: &str = "bea@example.com";
pub const BUYER_PASSWORD: &str = "buyer-pass";

pub fn seeded_gateway() -> Arc<MemoryGateway> {
    let gateway = Arc::new(MemoryGateway::new());
    let hash = hash_password(BUYER_PASSWORD, 4).unwrap();
    gateway.seed_user(BUYER, "Bea", BUYER_EMAIL, &hash);
    gateway.seed_user(OTHER_BUYER, "Cid", "cid@example.com", &hash);
    gateway.seed_user(SELLER, "Sam", "sam@example.com", &hash);
    gateway.seed_product(PRODUCT, "Lamp", 80.0, SELLER);
    gateway.seed_product(OTHER_PRODUCT, "Desk", 120.0, OTHER_BUYER);
    gateway
}

pub fn sample_message(id: MessageId, sender_id: UserId, receiver_id: UserId) -> ChatMessage {
    ChatMessage {
        id,
        product_id: PRODUCT,
        sender_id,
        receiver_id,
        body: "is it still available?".into(),
        created_at: Utc::now(),
    }
}

/// Collects every frame pushed to it, standing in for a live socket.
#[derive(Default)]
pub struct Probe {
    received: Vec<String>,
}

impl Actor for Probe {
    type Context = Context<Self>;
}

impl Handler<WsMessage> for Probe {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, _: &mut Context<Self>) {
        self.received.push(msg.0);
    }
}

/// Returns and clears what a [`Probe`] has received so far.
#[derive(Message)]
#[rtype(result = "Vec<String>")]
pub struct Drain;

impl Handler<Drain> for Probe {
    type Result = MessageResult<Drain>;

    fn handle(&mut self, _: Drain, _: &mut Context<Self>) -> Self::Result {
        MessageResult(std::mem::take(&mut self.received))
    }
}

/// Everything the HTTP layer needs, wired over a [`MemoryGateway`].
/// Must be built inside an actix system.
#[derive(Clone)]
pub struct TestState {
    pub gateway: Arc<MemoryGateway>,
    pub chat_server: Addr<ChatServer>,
    pub verifier: web::Data<IdentityVerifier>,
    pub channel: web::Data<ConversationChannel>,
    pub ledger: web::Data<OfferLedger>,
}

impl TestState {
    pub fn new() -> Self {
        let gateway = seeded_gateway();
        let chat_server = ChatServer::new().start();
        let verifier = IdentityVerifier::new(gateway.clone(), "test-secret", 3600, 4);
        let channel = ConversationChannel::new(gateway.clone(), chat_server.clone().recipient());
        let ledger = OfferLedger::new(gateway.clone(), gateway.clone());

        TestState {
            gateway,
            chat_server,
            verifier: web::Data::new(verifier),
            channel: web::Data::new(channel),
            ledger: web::Data::new(ledger),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.verifier.clone())
            .app_data(self.channel.clone())
            .app_data(self.ledger.clone())
            .app_data(web::Data::new(self.chat_server.clone()));
        handlers::routes(cfg);
    }

    pub fn bearer(&self, user_id: UserId) -> (&'static str, String) {
        let identity = Identity {
            user_id,
            display_name: format!("user-{}", user_id),
        };
        let token = self.verifier.issue_token(&identity).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }
}
