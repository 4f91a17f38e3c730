//! Inputs accepted by the store. Outputs are
//! [`MessageRecord`](courier_shared::MessageRecord)s shared with the wire
//! protocol.

use courier_shared::{MessageId, UserId};

pub use courier_shared::MessageRecord;

/// A message as submitted by a sender, before the store has assigned it an
/// id and a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub reply_to: Option<MessageId>,
}

impl NewMessage {
    pub fn new(sender_id: UserId, receiver_id: UserId, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            text: text.into(),
            reply_to: None,
        }
    }

    pub fn in_reply_to(mut self, parent: MessageId) -> Self {
        self.reply_to = Some(parent);
        self
    }
}
