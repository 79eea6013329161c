
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, error, info, warn};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthError, Identity, IdentityVerifier};
use crate::channel::{ConversationChannel, MessageDraft};
use crate::error::{ApiError, ApiResult};
use crate::events::{
    event_name, AuthenticatePayload, ClientEvent, MessageAck, SendMessagePayload, ServerEvent,
};
use crate::models::{ProductId, UserId};
use crate::registry::ConnectionId;
use crate::ws::{ChatServer, Connect, Disconnect, WsMessage};

struct WsSession {
    conn_id: ConnectionId,
    identity: Option<Identity>,
    server_addr: Addr<ChatServer>,
    channel: web::Data<ConversationChannel>,
    verifier: web::Data<IdentityVerifier>,
}

impl WsSession {
    fn emit(&self, event: &ServerEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event.to_json() {
            Ok(frame) => ctx.text(frame),
            Err(e) => error!("could not encode event for connection {}: {}", self.conn_id, e),
        }
    }

    fn on_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(ClientEvent::Authenticate(payload)) => self.authenticate(payload, ctx),
            Ok(ClientEvent::SendMessage(payload)) => self.send_message(payload, ctx),
            Err(e) => {
                warn!("connection {} sent an unreadable frame: {}", self.conn_id, e);
                if event_name(text).as_deref() == Some("authenticate") {
                    self.drop_identity();
                    self.emit(&ServerEvent::authenticated(false), ctx);
                }
            }
        }
    }

    fn authenticate(&mut self, payload: AuthenticatePayload, ctx: &mut ws::WebsocketContext<Self>) {
        let verifier = self.verifier.clone();

        // `wait` holds back further frames until this resolves.
        ctx.wait(
            async move { resolve_identity(&verifier, payload).await }
                .into_actor(self)
                .map(|result, act, ctx| match result {
                    Ok(identity) => {
                        act.server_addr.do_send(Connect {
                            conn_id: act.conn_id,
                            user_id: identity.user_id,
                            addr: ctx.address().recipient(),
                        });
                        act.identity = Some(identity);
                        act.emit(&ServerEvent::authenticated(true), ctx);
                    }
                    Err(e) => {
                        warn!("connection {} failed to authenticate: {}", act.conn_id, e);
                        act.drop_identity();
                        act.emit(&ServerEvent::authenticated(false), ctx);
                    }
                }),
        );
    }

    /// A failed authenticate leaves the connection anonymous and unregistered.
    fn drop_identity(&mut self) {
        if let Some(previous) = self.identity.take() {
            info!("connection {} no longer acts as user {}", self.conn_id, previous.user_id);
            self.server_addr.do_send(Disconnect { conn_id: self.conn_id });
        }
    }

    fn send_message(&mut self, payload: SendMessagePayload, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(identity) = &self.identity else {
            warn!("connection {} sent a message before authenticating", self.conn_id);
            return;
        };
        if identity.user_id != payload.sender_id {
            warn!(
                "connection {} of user {} tried to send as user {}",
                self.conn_id, identity.user_id, payload.sender_id
            );
            return;
        }

        let channel = self.channel.clone();
        let draft = MessageDraft::from(payload);

        ctx.wait(
            async move { channel.send(draft).await }
                .into_actor(self)
                .map(|result, act, ctx| match result {
                    Ok(delivery) => act.emit(
                        &ServerEvent::MessageSent(MessageAck {
                            id: delivery.message.id,
                            created_at: delivery.message.created_at,
                            delivered_to: delivery.delivered_to,
                        }),
                        ctx,
                    ),
                    Err(e) => warn!("message from connection {} dropped: {}", act.conn_id, e),
                }),
        );
    }
}

/// A token wins over a bare user id; when both are given they must agree.
/// Either way the user must still exist.
async fn resolve_identity(
    verifier: &IdentityVerifier,
    payload: AuthenticatePayload,
) -> Result<Identity, AuthError> {
    let user_id = match (payload.token, payload.user_id) {
        (Some(token), claimed) => {
            let identity = verifier.verify_token(&token)?;
            if claimed.is_some_and(|id| id != identity.user_id) {
                return Err(AuthError::InvalidToken);
            }
            identity.user_id
        }
        (None, Some(user_id)) => user_id,
        (None, None) => return Err(AuthError::InvalidCredentials),
    };

    verifier.resolve_user(user_id).await
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        debug!("connection {} opened", self.conn_id);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if self.identity.is_some() {
            self.server_addr.do_send(Disconnect { conn_id: self.conn_id });
        }
        debug!("connection {} closed", self.conn_id);
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.on_text(&text, ctx),
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("connection {} protocol error: {}", self.conn_id, e);
                ctx.stop();
            }
            _ => (),
        }
    }
}

impl Handler<WsMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

pub async fn start_ws_connection(
    req: HttpRequest,
    stream: web::Payload,
    chat_server: web::Data<Addr<ChatServer>>,
    channel: web::Data<ConversationChannel>,
    verifier: web::Data<IdentityVerifier>,
) -> Result<HttpResponse, Error> {
    let session = WsSession {
        conn_id: Uuid::new_v4(),
        identity: None,
        server_addr: chat_server.get_ref().clone(),
        channel,
        verifier,
    };
    ws::start(session, &req, stream)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    product_id: Option<ProductId>,
    #[serde(alias = "senderId")]
    user_a: Option<UserId>,
    #[serde(alias = "receiverId")]
    user_b: Option<UserId>,
}

pub async fn get_messages(
    channel: web::Data<ConversationChannel>,
    identity: web::ReqData<Identity>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    let (Some(product_id), Some(user_a), Some(user_b)) = (query.product_id, query.user_a, query.user_b) else {
        return Err(ApiError::Validation("Missing required parameters".into()));
    };
    if identity.user_id != user_a && identity.user_id != user_b {
        return Err(ApiError::Forbidden("not a party to this conversation".into()));
    }

    let messages = channel.fetch_history(product_id, user_a, user_b).await?;
    Ok(HttpResponse::Ok().json(messages))
}
