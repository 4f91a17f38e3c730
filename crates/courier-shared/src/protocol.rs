use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{MessageId, UserId};

/// A persisted chat message. Only the store creates these; everyone else
/// forwards read-only copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    #[serde(default)]
    pub read: bool,
}

/// Events a client sends over its WebSocket.
///
/// Encoded as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Declare which user owns this connection
    #[serde(rename = "joinUser")]
    JoinUser(UserId),

    /// Persist and deliver a chat message
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessage),

    /// SDP offer for the callee
    #[serde(rename = "call-user")]
    CallUser { to: UserId, offer: Value },

    /// SDP answer for the original caller
    #[serde(rename = "answer-call")]
    AnswerCall { to: UserId, answer: Value },

    /// Trickled ICE candidate
    #[serde(rename = "ice-candidate")]
    IceCandidate { to: UserId, candidate: Value },

    /// Hang up
    #[serde(rename = "end-call")]
    EndCall { to: UserId },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

/// Events the relay pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(MessageRecord),

    #[serde(rename = "incoming-call")]
    IncomingCall { from: UserId, offer: Value },

    #[serde(rename = "call-answered")]
    CallAnswered { from: UserId, answer: Value },

    #[serde(rename = "ice-candidate")]
    IceCandidate { from: UserId, candidate: Value },

    #[serde(rename = "call-ended")]
    CallEnded {
        #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
    },

    /// A `sendMessage` from this connection could not be persisted.
    #[serde(rename = "messageError")]
    MessageError {
        #[serde(rename = "receiverId")]
        receiver_id: UserId,
        error: String,
    },
}

impl ClientEvent {
    /// Decode a text frame and reject payloads that parse but carry no
    /// usable content.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let event: ClientEvent = serde_json::from_str(text)?;
        event.validate()?;
        Ok(event)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinUser(_) => "joinUser",
            ClientEvent::SendMessage(_) => "sendMessage",
            ClientEvent::CallUser { .. } => "call-user",
            ClientEvent::AnswerCall { .. } => "answer-call",
            ClientEvent::IceCandidate { .. } => "ice-candidate",
            ClientEvent::EndCall { .. } => "end-call",
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientEvent::JoinUser(user) if user.is_empty() => {
                Err(ProtocolError::EmptyIdentifier("userId"))
            }
            ClientEvent::SendMessage(msg) if msg.sender_id.is_empty() => {
                Err(ProtocolError::EmptyIdentifier("senderId"))
            }
            ClientEvent::SendMessage(msg) if msg.receiver_id.is_empty() => {
                Err(ProtocolError::EmptyIdentifier("receiverId"))
            }
            ClientEvent::CallUser { to, .. }
            | ClientEvent::AnswerCall { to, .. }
            | ClientEvent::IceCandidate { to, .. }
            | ClientEvent::EndCall { to }
                if to.is_empty() =>
            {
                Err(ProtocolError::EmptyIdentifier("to"))
            }
            ClientEvent::CallUser { offer: Value::Null, .. } => {
                Err(ProtocolError::MissingPayload("offer"))
            }
            ClientEvent::AnswerCall { answer: Value::Null, .. } => {
                Err(ProtocolError::MissingPayload("answer"))
            }
            ClientEvent::IceCandidate { candidate: Value::Null, .. } => {
                Err(ProtocolError::MissingPayload("candidate"))
            }
            _ => Ok(()),
        }
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ReceiveMessage(_) => "receiveMessage",
            ServerEvent::IncomingCall { .. } => "incoming-call",
            ServerEvent::CallAnswered { .. } => "call-answered",
            ServerEvent::IceCandidate { .. } => "ice-candidate",
            ServerEvent::CallEnded { .. } => "call-ended",
            ServerEvent::MessageError { .. } => "messageError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_send_message() {
        let text = r#"{"event":"sendMessage","data":{"senderId":"a","receiverId":"b","text":"hi"}}"#;
        let event = ClientEvent::from_json(text).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage(SendMessage {
                sender_id: "a".into(),
                receiver_id: "b".into(),
                text: "hi".to_string(),
                reply_to: None,
            })
        );
    }

    #[test]
    fn test_decode_join_user() {
        let event = ClientEvent::from_json(r#"{"event":"joinUser","data":"alice"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinUser("alice".into()));
    }

    #[test]
    fn test_offer_payload_is_forwarded_verbatim() {
        let text = r#"{"event":"call-user","data":{"to":"b","offer":{"type":"offer","sdp":"v=0"}}}"#;
        match ClientEvent::from_json(text).unwrap() {
            ClientEvent::CallUser { to, offer } => {
                assert_eq!(to, UserId::from("b"));
                assert_eq!(offer, json!({"type": "offer", "sdp": "v=0"}));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_missing_offer_is_rejected() {
        let text = r#"{"event":"call-user","data":{"to":"b"}}"#;
        assert!(ClientEvent::from_json(text).is_err());

        let text = r#"{"event":"call-user","data":{"to":"b","offer":null}}"#;
        assert!(matches!(
            ClientEvent::from_json(text),
            Err(ProtocolError::MissingPayload("offer"))
        ));
    }

    #[test]
    fn test_empty_target_is_rejected() {
        let text = r#"{"event":"end-call","data":{"to":""}}"#;
        assert!(matches!(
            ClientEvent::from_json(text),
            Err(ProtocolError::EmptyIdentifier("to"))
        ));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientEvent::from_json(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(ClientEvent::from_json("not json").is_err());
    }

    #[test]
    fn test_call_ended_wire_shape() {
        let event = ServerEvent::CallEnded {
            user_id: Some("alice".into()),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "call-ended", "data": {"userId": "alice"}}));

        let anonymous = ServerEvent::CallEnded { user_id: None };
        let value: Value = serde_json::from_str(&anonymous.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "call-ended", "data": {}}));
    }

    #[test]
    fn test_message_record_uses_camel_case() {
        let record = MessageRecord {
            id: MessageId::new(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            text: "hi".to_string(),
            created_at: Utc::now(),
            reply_to: None,
            read: false,
        };
        let value = serde_json::to_value(ServerEvent::ReceiveMessage(record)).unwrap();
        assert_eq!(value["event"], "receiveMessage");
        assert_eq!(value["data"]["senderId"], "a");
        assert_eq!(value["data"]["receiverId"], "b");
        assert!(value["data"].get("createdAt").is_some());
        assert!(value["data"].get("replyTo").is_none());
    }
}
