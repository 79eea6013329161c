//! JSON frames exchanged over the real-time connection.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::models::{Message, MessageId, ProductId, UserId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Authenticate(AuthenticatePayload),
    SendMessage(SendMessagePayload),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    #[serde(default, deserialize_with = "numeric_or_string_id")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Browser clients often send ids as strings (`"7"`).
fn numeric_or_string_id<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(UserId),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("`{}` is not a user id", text))),
    }
}

/// Names the event of a frame that failed to parse, if it has one.
pub fn event_name(frame: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(frame).ok()?;
    value.get("event")?.as_str().map(str::to_owned)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub product_id: ProductId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Authenticated(AuthenticatedPayload),
    NewMessage(Message),
    MessageSent(MessageAck),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedPayload {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAck {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub delivered_to: usize,
}

impl ServerEvent {
    pub fn authenticated(success: bool) -> Self {
        ServerEvent::Authenticated(AuthenticatedPayload { success })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_frame_parses() {
        let frame = r#"{"event":"sendMessage","data":{"senderId":7,"receiverId":9,"productId":3,"message":"hi"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage(SendMessagePayload {
                sender_id: 7,
                receiver_id: 9,
                product_id: 3,
                message: "hi".into(),
            })
        );
    }

    #[test]
    fn authenticate_accepts_user_id_or_token() {
        let by_id: ClientEvent =
            serde_json::from_str(r#"{"event":"authenticate","data":{"userId":7}}"#).unwrap();
        assert_eq!(
            by_id,
            ClientEvent::Authenticate(AuthenticatePayload { user_id: Some(7), token: None })
        );

        let by_token: ClientEvent =
            serde_json::from_str(r#"{"event":"authenticate","data":{"token":"abc"}}"#).unwrap();
        assert_eq!(
            by_token,
            ClientEvent::Authenticate(AuthenticatePayload { user_id: None, token: Some("abc".into()) })
        );
    }

    #[test]
    fn string_user_ids_are_accepted() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"authenticate","data":{"userId":"7"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Authenticate(AuthenticatePayload { user_id: Some(7), token: None })
        );

        let frame = r#"{"event":"authenticate","data":{"userId":"seven"}}"#;
        assert!(serde_json::from_str::<ClientEvent>(frame).is_err());
        assert_eq!(event_name(frame).as_deref(), Some("authenticate"));
        assert_eq!(event_name("not json"), None);
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"typing","data":{}}"#).is_err());
    }

    #[test]
    fn server_events_are_tagged() {
        let frame: serde_json::Value =
            serde_json::from_str(&ServerEvent::authenticated(false).to_json().unwrap()).unwrap();
        assert_eq!(frame, json!({"event": "authenticated", "data": {"success": false}}));
    }
}
