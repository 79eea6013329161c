
use actix::prelude::*;
use log::{debug, error, info};
use std::collections::HashMap;

use crate::events::ServerEvent;
use crate::models::{Message as ChatMessage, UserId};
use crate::registry::{ConnectionId, ConnectionRegistry};

#[derive(Message)]
#[rtype(result = "()")]
pub struct WsMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub conn_id: ConnectionId,
    pub user_id: UserId,
    pub addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub conn_id: ConnectionId,
}

/// Push a persisted message to every live connection of its receiver.
/// Answers with the number of connections it was handed to.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Deliver(pub ChatMessage);

/// Owner of the connection registry. Its mailbox is the single point where
/// live-connection state is read and changed.
pub struct ChatServer {
    sessions: HashMap<ConnectionId, Recipient<WsMessage>>,
    registry: ConnectionRegistry,
}

impl ChatServer {
    pub fn new() -> ChatServer {
        ChatServer {
            sessions: HashMap::new(),
            registry: ConnectionRegistry::new(),
        }
    }
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.registry.register(msg.user_id, msg.conn_id);
        self.sessions.insert(msg.conn_id, msg.addr);
        info!(
            "connection {} registered for user {} ({} live)",
            msg.conn_id,
            msg.user_id,
            self.registry.connection_count()
        );
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        self.sessions.remove(&msg.conn_id);
        if let Some(user_id) = self.registry.unregister(msg.conn_id) {
            info!("connection {} of user {} closed", msg.conn_id, user_id);
        }
    }
}

impl Handler<Deliver> for ChatServer {
    type Result = MessageResult<Deliver>;

    fn handle(&mut self, msg: Deliver, _: &mut Context<Self>) -> Self::Result {
        let receiver_id = msg.0.receiver_id;
        let message_id = msg.0.id;
        let handles = self.registry.resolve(receiver_id);
        if handles.is_empty() {
            debug!("user {} is offline; message {} stays in history", receiver_id, message_id);
            return MessageResult(0);
        }

        let frame = match ServerEvent::NewMessage(msg.0).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                error!("could not encode message {}: {}", message_id, e);
                return MessageResult(0);
            }
        };

        let mut delivered = 0;
        for handle in handles {
            match self.sessions.get(&handle) {
                Some(addr) => match addr.try_send(WsMessage(frame.clone())) {
                    Ok(()) => delivered += 1,
                    Err(e) => debug!("skipping connection {} of user {}: {}", handle, receiver_id, e),
                },
                None => debug!("connection {} vanished before delivery", handle),
            }
        }
        MessageResult(delivered)
    }
}
