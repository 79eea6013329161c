
use std::sync::Arc;

use actix::Recipient;
use chrono::Utc;
use log::{error, warn};
use thiserror::Error;

use crate::events::SendMessagePayload;
use crate::gateway::{GatewayError, PersistenceGateway};
use crate::models::{Message, NewMessage, ProductId, UserId};
use crate::ws::Deliver;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("message could not be persisted: {0}")]
    PersistenceFailure(#[from] GatewayError),
}

#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub product_id: ProductId,
    pub body: String,
}

impl From<SendMessagePayload> for MessageDraft {
    fn from(payload: SendMessagePayload) -> Self {
        MessageDraft {
            sender_id: payload.sender_id,
            receiver_id: payload.receiver_id,
            product_id: payload.product_id,
            body: payload.message,
        }
    }
}

/// Outcome of a send: the stored message and how many live connections of
/// the receiver it was pushed to (zero when offline).
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub delivered_to: usize,
}

/// Validates, persists and routes messages between the two parties of a
/// product conversation.
pub struct ConversationChannel {
    gateway: Arc<dyn PersistenceGateway>,
    router: Recipient<Deliver>,
}

impl ConversationChannel {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, router: Recipient<Deliver>) -> Self {
        ConversationChannel { gateway, router }
    }

    /// The write is the durability point: nothing is pushed unless it
    /// succeeded, and a failed push never undoes it.
    pub async fn send(&self, draft: MessageDraft) -> Result<Delivery, ChannelError> {
        validate(&draft)?;
        self.check_parties(&draft).await?;

        let message = self
            .gateway
            .insert_message(NewMessage {
                product_id: draft.product_id,
                sender_id: draft.sender_id,
                receiver_id: draft.receiver_id,
                body: draft.body,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                error!("error inserting message into database: {}", e);
                ChannelError::PersistenceFailure(e)
            })?;

        let delivered_to = match self.router.send(Deliver(message.clone())).await {
            Ok(count) => count,
            Err(e) => {
                warn!("message {} stored but not pushed: {}", message.id, e);
                0
            }
        };

        Ok(Delivery { message, delivered_to })
    }

    pub async fn fetch_history(
        &self,
        product_id: ProductId,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<Message>, ChannelError> {
        Ok(self.gateway.conversation(product_id, user_a, user_b).await?)
    }

    async fn check_parties(&self, draft: &MessageDraft) -> Result<(), ChannelError> {
        for user_id in [draft.sender_id, draft.receiver_id] {
            if self.gateway.find_user(user_id).await?.is_none() {
                return Err(ChannelError::NotFound(format!("user {}", user_id)));
            }
        }
        if self.gateway.find_product(draft.product_id).await?.is_none() {
            return Err(ChannelError::NotFound(format!("product {}", draft.product_id)));
        }
        Ok(())
    }
}

fn validate(draft: &MessageDraft) -> Result<(), ChannelError> {
    if draft.body.trim().is_empty() {
        return Err(ChannelError::InvalidMessage("message body is empty"));
    }
    if draft.sender_id == draft.receiver_id {
        return Err(ChannelError::InvalidMessage("sender and receiver are the same user"));
    }
    Ok(())
}
